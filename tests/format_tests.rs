use belog::number_format::{format_float, format_integer, INT_SCRATCH};
use belog::segment::{FloatSegment, IntSegment};
use belog::{fmt, Adaptive, Hex, Padding, Precision, Scientific, ShowSign, Uppercase};

fn render_int(segment: IntSegment) -> String {
    let mut scratch = [0u8; INT_SCRATCH];
    let len = format_integer(segment.attrs, &segment.raw, &mut scratch);
    String::from_utf8_lossy(&scratch[..len]).into_owned()
}

fn render_float(segment: FloatSegment) -> String {
    let mut out = String::new();
    format_float(segment.attrs, &segment.raw, &mut out);
    out
}

const SAMPLES_I64: &[i64] = &[
    0,
    1,
    -1,
    7,
    -7,
    42,
    99,
    100,
    -100,
    9_999,
    65_535,
    -65_536,
    1_000_000_007,
    i32::MIN as i64,
    i32::MAX as i64,
    i64::MIN,
    i64::MAX,
];

#[test]
fn decimal_matches_the_reference_formatter_across_widths() {
    for &value in SAMPLES_I64 {
        assert_eq!(render_int(IntSegment::from(value)), value.to_string());
        if let Ok(narrow) = i32::try_from(value) {
            assert_eq!(render_int(IntSegment::from(narrow)), narrow.to_string());
        }
        if let Ok(narrow) = i16::try_from(value) {
            assert_eq!(render_int(IntSegment::from(narrow)), narrow.to_string());
        }
        if let Ok(narrow) = i8::try_from(value) {
            assert_eq!(render_int(IntSegment::from(narrow)), narrow.to_string());
        }
        let unsigned = value as u64;
        assert_eq!(render_int(IntSegment::from(unsigned)), unsigned.to_string());
    }
}

#[test]
fn hex_matches_the_reference_formatter() {
    for &value in SAMPLES_I64 {
        let unsigned = value as u64;
        assert_eq!(render_int(fmt(unsigned, Hex)), format!("{:x}", unsigned));
        assert_eq!(
            render_int(fmt(unsigned, (Hex, Uppercase))),
            format!("{:X}", unsigned)
        );
        if let Ok(narrow) = u32::try_from(unsigned) {
            assert_eq!(render_int(fmt(narrow, Hex)), format!("{:x}", narrow));
        }
    }
    // Signed values render the two's complement bits of their own width.
    assert_eq!(render_int(fmt(-1i16, Hex)), "ffff");
    assert_eq!(render_int(fmt(i32::MIN, Hex)), "80000000");
}

#[test]
fn padding_matrix_matches_expected_layouts() {
    let cases: &[(IntSegment, &str)] = &[
        (fmt(-7i32, Padding::new(4, '0')), "-007"),
        (fmt(255u32, (Hex, Padding::new(4, '0'), Uppercase)), "00FF"),
        (fmt(5i32, Padding::new(5, ' ')), "    5"),
        (fmt(5i32, Padding::new(5, ' ').left_aligned()), "5    "),
        (fmt(-5i32, Padding::new(5, ' ').left_aligned()), "-5   "),
        (fmt(5i32, (ShowSign, Padding::new(5, '0'))), "+0005"),
        (fmt(123456i32, Padding::new(4, '0')), "123456"),
        (fmt(0xabcu32, (Hex, Padding::new(8, ' '))), "     abc"),
    ];
    for (segment, expected) in cases {
        assert_eq!(render_int(*segment), *expected);
    }
}

#[test]
fn plain_floats_reparse_to_the_rounded_value() {
    for &value in &[0.0f64, 1.5, -2.25, 3.14159265, 12345.678, -0.0625] {
        for precision in [0u32, 1, 2, 4, 6] {
            let text = render_float(fmt(value, Precision(precision)));
            assert_eq!(text, format!("{:.*}", precision as usize, value));
            let reparsed: f64 = text.parse().expect("parseable");
            let tolerance = 0.5 * 10f64.powi(-(precision as i32));
            assert!(
                (reparsed - value).abs() <= tolerance,
                "{} at precision {} reparsed as {}",
                value,
                precision,
                reparsed
            );
        }
    }
}

#[test]
fn scientific_floats_reparse_within_the_significance() {
    for &value in &[1.0f64, -1.0, 1234.5, 0.00015, 6.022e23, -2.5e-7] {
        let text = render_float(fmt(value, Scientific));
        let reparsed: f64 = text.parse().expect("parseable");
        let relative = ((reparsed - value) / value).abs();
        assert!(
            relative < 1e-6,
            "{} rendered as {} reparsed as {}",
            value,
            text,
            reparsed
        );
    }
}

#[test]
fn adaptive_picks_the_compact_notation() {
    let cases: &[(f64, &str)] = &[
        (0.0, "0"),
        (100.0, "100"),
        (0.5, "0.5"),
        (0.0001, "0.0001"),
        (0.00001, "1e-05"),
        (1234567.0, "1.23457e+06"),
        (-42.0, "-42"),
    ];
    for &(value, expected) in cases {
        assert_eq!(render_float(fmt(value, Adaptive)), expected);
    }
}

#[test]
fn hex_floats_are_exact_for_powers_of_two() {
    let cases: &[(f64, &str)] = &[
        (1.0, "0x1p+0"),
        (2.0, "0x1p+1"),
        (0.5, "0x1p-1"),
        (0.375, "0x1.8p-2"),
        (-4.0, "-0x1p+2"),
        (255.0, "0x1.fep+7"),
    ];
    for &(value, expected) in cases {
        assert_eq!(render_float(fmt(value, Hex)), expected);
    }
    assert_eq!(render_float(fmt(1.5f32, Hex)), "0x1.8p+0");
}
