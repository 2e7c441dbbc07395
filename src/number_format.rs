//! Rendering of integer and float segments into text.
//!
//! Integers are rendered into a caller-provided scratch buffer without
//! allocating. Floats go through `std::fmt` for the plain and scientific
//! styles and through the raw bit pattern for `%a`-style hexadecimal.

use std::fmt::Write;

use crate::segment::{
    FloatAttributes, IntAttributes, DISPLAY_ADAPTIVE, DISPLAY_HEXADECIMAL, DISPLAY_PLAIN,
    DISPLAY_SCIENTIFIC, PRECISION_UNSPECIFIED, SIGN_PAD_IF_POSITIVE, SIGN_SHOW_ALWAYS,
};

/// Scratch capacity for one rendered integer: sign, up to 20 digits, and up
/// to 31 fill characters.
pub const INT_SCRATCH: usize = 64;

/// Fractional digits used by the plain and scientific styles, and
/// significant digits used by the adaptive style, when no precision is set.
const DEFAULT_PRECISION: usize = 6;

/// Two-digit pairs "00" through "99", so decimal conversion emits two digits
/// per division.
const DIGIT_PAIRS: [u8; 200] = {
    let mut table = [0u8; 200];
    let mut i = 0;
    while i < 100 {
        table[i * 2] = b'0' + (i / 10) as u8;
        table[i * 2 + 1] = b'0' + (i % 10) as u8;
        i += 1;
    }
    table
};

const HEX_LOWER: &[u8; 16] = b"0123456789abcdef";
const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Renders one integer segment into `scratch` and returns the filled length.
pub fn format_integer(attrs: IntAttributes, raw: &[u8; 8], scratch: &mut [u8; INT_SCRATCH]) -> usize {
    let width = 1usize << attrs.length_log2();
    let mut word = [0u8; 8];
    word[..width].copy_from_slice(&raw[..width]);
    let bits = u64::from_ne_bytes(word);

    let mut digits = [0u8; 20];
    let mut cursor = digits.len();
    let mut sign = 0u8;

    if attrs.is_hex() != 0 {
        let table = if attrs.is_uppercase() != 0 {
            HEX_UPPER
        } else {
            HEX_LOWER
        };
        // One nibble per 4 bits up to the top set bit; zero still gets one.
        let top_bit = 63 - (bits | 1).leading_zeros() as usize;
        let mut value = bits;
        for _ in 0..top_bit / 4 + 1 {
            cursor -= 1;
            digits[cursor] = table[(value & 0xf) as usize];
            value >>= 4;
        }
    } else {
        let mut magnitude = bits;
        if attrs.is_unsigned() == 0 {
            let shift = 64 - width * 8;
            let value = ((bits << shift) as i64) >> shift;
            if value < 0 {
                sign = b'-';
                magnitude = (value as u64).wrapping_neg();
            }
        }
        if sign == 0 && attrs.show_sign() != 0 {
            sign = b'+';
        }

        while magnitude >= 100 {
            let pair = (magnitude % 100) as usize * 2;
            cursor -= 2;
            digits[cursor] = DIGIT_PAIRS[pair];
            digits[cursor + 1] = DIGIT_PAIRS[pair + 1];
            magnitude /= 100;
        }
        if magnitude >= 10 {
            let pair = magnitude as usize * 2;
            cursor -= 2;
            digits[cursor] = DIGIT_PAIRS[pair];
            digits[cursor + 1] = DIGIT_PAIRS[pair + 1];
        } else {
            cursor -= 1;
            digits[cursor] = b'0' + magnitude as u8;
        }
    }

    let digit_len = digits.len() - cursor;
    let sign_len = usize::from(sign != 0);
    let fill_len = (attrs.padded_length() as usize).saturating_sub(digit_len + sign_len);
    // Byte padding only; wider codepoints are truncated to their low byte.
    let fill = (attrs.padding_codepoint() & 0xff) as u8;

    let mut out = 0;
    if sign != 0 {
        scratch[out] = sign;
        out += 1;
    }
    if attrs.is_left_aligned() == 0 {
        scratch[out..out + fill_len].fill(fill);
        out += fill_len;
        scratch[out..out + digit_len].copy_from_slice(&digits[cursor..]);
        out += digit_len;
    } else {
        scratch[out..out + digit_len].copy_from_slice(&digits[cursor..]);
        out += digit_len;
        scratch[out..out + fill_len].fill(fill);
        out += fill_len;
    }
    out
}

/// Renders one float segment, appending to `out`.
pub fn format_float(attrs: FloatAttributes, raw: &[u8; 16], out: &mut String) {
    let value = match attrs.length_log2() {
        2 => {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&raw[..4]);
            f32::from_ne_bytes(bytes) as f64
        }
        _ => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&raw[..8]);
            f64::from_ne_bytes(bytes)
        }
    };

    let uppercase = attrs.is_uppercase() != 0;
    let force_point = attrs.always_show_decimal_point() != 0;
    let precision = match attrs.precision() {
        PRECISION_UNSPECIFIED => None,
        p => Some(p as usize),
    };

    if value.is_nan() {
        match attrs.sign_handling() {
            SIGN_SHOW_ALWAYS => out.push('+'),
            SIGN_PAD_IF_POSITIVE => out.push(' '),
            _ => {}
        }
        out.push_str(if uppercase { "NAN" } else { "nan" });
        return;
    }

    if value.is_sign_negative() {
        out.push('-');
    } else {
        match attrs.sign_handling() {
            SIGN_SHOW_ALWAYS => out.push('+'),
            SIGN_PAD_IF_POSITIVE => out.push(' '),
            _ => {}
        }
    }

    let magnitude = value.abs();
    if magnitude.is_infinite() {
        out.push_str(if uppercase { "INF" } else { "inf" });
        return;
    }

    match attrs.display_style() {
        DISPLAY_SCIENTIFIC => {
            let p = precision.unwrap_or(DEFAULT_PRECISION);
            write_scientific(out, magnitude, p, uppercase, force_point);
        }
        DISPLAY_HEXADECIMAL => {
            write_hexadecimal(out, magnitude, precision, uppercase, force_point);
        }
        DISPLAY_ADAPTIVE => {
            let significant = precision.unwrap_or(DEFAULT_PRECISION).max(1);
            write_adaptive(out, magnitude, significant, uppercase, force_point);
        }
        _ => {
            debug_assert_eq!(attrs.display_style(), DISPLAY_PLAIN);
            let p = precision.unwrap_or(DEFAULT_PRECISION);
            let _ = write!(out, "{:.*}", p, magnitude);
            if force_point && p == 0 {
                out.push('.');
            }
        }
    }
}

/// `1.234568e+07` shape: rounded mantissa, explicit exponent sign, exponent
/// of at least two digits.
fn write_scientific(out: &mut String, value: f64, precision: usize, uppercase: bool, force_point: bool) {
    let formatted = format!("{:.*e}", precision, value);
    let (mantissa, exponent) = formatted
        .split_once('e')
        .unwrap_or((formatted.as_str(), "0"));
    out.push_str(mantissa);
    if force_point && precision == 0 {
        out.push('.');
    }
    out.push(if uppercase { 'E' } else { 'e' });
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let _ = write!(
        out,
        "{}{:02}",
        if exponent < 0 { '-' } else { '+' },
        exponent.abs()
    );
}

/// Fixed or scientific, chosen by the value's rounded decimal exponent, with
/// trailing fractional zeros removed unless the decimal point is forced.
fn write_adaptive(out: &mut String, value: f64, significant: usize, uppercase: bool, force_point: bool) {
    let probe = format!("{:.*e}", significant - 1, value);
    let (probe_mantissa, probe_exponent) = probe
        .split_once('e')
        .unwrap_or((probe.as_str(), "0"));
    let exponent: i32 = probe_exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= significant as i32 {
        let mut mantissa = probe_mantissa.to_string();
        if force_point {
            if !mantissa.contains('.') {
                mantissa.push('.');
            }
        } else {
            trim_fraction_zeros(&mut mantissa);
        }
        out.push_str(&mantissa);
        out.push(if uppercase { 'E' } else { 'e' });
        let _ = write!(
            out,
            "{}{:02}",
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        );
    } else {
        let decimals = (significant as i32 - 1 - exponent).max(0) as usize;
        let mut fixed = format!("{:.*}", decimals, value);
        if force_point {
            if !fixed.contains('.') {
                fixed.push('.');
            }
        } else {
            trim_fraction_zeros(&mut fixed);
        }
        out.push_str(&fixed);
    }
}

fn trim_fraction_zeros(text: &mut String) {
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
}

/// `%a` shape: `0x1.<hex fraction>p<+/-><binary exponent>`. Without an
/// explicit precision the shortest exact fraction is emitted; with one, the
/// fraction is rounded half-to-even to that many hex digits.
fn write_hexadecimal(
    out: &mut String,
    value: f64,
    precision: Option<usize>,
    uppercase: bool,
    force_point: bool,
) {
    const FRACTION_BITS: usize = 52;
    const FRACTION_NIBBLES: usize = FRACTION_BITS / 4;

    let bits = value.to_bits();
    let exponent_bits = ((bits >> FRACTION_BITS) & 0x7ff) as i64;
    let mut fraction = bits & ((1u64 << FRACTION_BITS) - 1);

    let (mut lead, exponent) = if exponent_bits == 0 {
        // Zero and subnormals keep a zero leading digit.
        (0u64, if fraction == 0 { 0 } else { -1022 })
    } else {
        (1u64, exponent_bits - 1023)
    };

    let keep = precision.unwrap_or(FRACTION_NIBBLES).min(FRACTION_NIBBLES);
    let dropped_bits = (FRACTION_NIBBLES - keep) * 4;
    if dropped_bits > 0 {
        let dropped = fraction & ((1u64 << dropped_bits) - 1);
        fraction >>= dropped_bits;
        let half = 1u64 << (dropped_bits - 1);
        if dropped > half || (dropped == half && fraction & 1 == 1) {
            fraction += 1;
            if keep == 0 || fraction >> (keep * 4) != 0 {
                fraction = 0;
                lead += 1;
            }
        }
    }

    let mut nibbles = keep;
    if precision.is_none() {
        while nibbles > 0 && fraction & 0xf == 0 {
            fraction >>= 4;
            nibbles -= 1;
        }
    }
    let total = precision.unwrap_or(nibbles);

    let table = if uppercase { HEX_UPPER } else { HEX_LOWER };
    out.push_str(if uppercase { "0X" } else { "0x" });
    out.push(table[lead as usize] as char);
    if total > 0 || force_point {
        out.push('.');
    }
    for i in (0..nibbles).rev() {
        out.push(table[(fraction >> (i * 4) & 0xf) as usize] as char);
    }
    for _ in nibbles..total {
        out.push('0');
    }
    out.push(if uppercase { 'P' } else { 'p' });
    let _ = write!(
        out,
        "{}{}",
        if exponent < 0 { '-' } else { '+' },
        exponent.abs()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{
        fmt, Adaptive, FloatSegment, Hex, IntSegment, PadSign, Padding, Precision, Scientific,
        ShowPoint, ShowSign, Uppercase,
    };

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

    #[test]
    fn plain_decimal_across_widths() {
        assert_eq!(render_int(IntSegment::from(0u8)), "0");
        assert_eq!(render_int(IntSegment::from(42i32)), "42");
        assert_eq!(render_int(IntSegment::from(-7i16)), "-7");
        assert_eq!(render_int(IntSegment::from(u64::MAX)), u64::MAX.to_string());
        assert_eq!(render_int(IntSegment::from(i64::MIN)), i64::MIN.to_string());
        assert_eq!(render_int(IntSegment::from(i8::MIN)), "-128");
        assert_eq!(render_int(IntSegment::from(12345usize)), "12345");
    }

    #[test]
    fn zero_padded_negative_keeps_the_sign_first() {
        assert_eq!(render_int(fmt(-7i32, Padding::new(4, '0'))), "-007");
    }

    #[test]
    fn hex_uppercase_padded() {
        assert_eq!(
            render_int(fmt(255u32, (Hex, Padding::new(4, '0'), Uppercase))),
            "00FF"
        );
    }

    #[test]
    fn hex_width_follows_the_top_set_bit() {
        assert_eq!(render_int(fmt(0u32, Hex)), "0");
        assert_eq!(render_int(fmt(0xfu32, Hex)), "f");
        assert_eq!(render_int(fmt(0x10u32, Hex)), "10");
        assert_eq!(render_int(fmt(u64::MAX, Hex)), "ffffffffffffffff");
        // Negative values show the two's complement bits of their width.
        assert_eq!(render_int(fmt(-1i32, Hex)), "ffffffff");
        assert_eq!(render_int(fmt(-1i8, Hex)), "ff");
    }

    #[test]
    fn alignment_and_fill() {
        assert_eq!(render_int(fmt(42i32, Padding::new(6, ' '))), "    42");
        assert_eq!(
            render_int(fmt(42i32, Padding::new(6, ' ').left_aligned())),
            "42    "
        );
        assert_eq!(render_int(fmt(7u8, Padding::new(3, '*'))), "**7");
        // Width already satisfied: no fill.
        assert_eq!(render_int(fmt(12345i32, Padding::new(3, '0'))), "12345");
    }

    #[test]
    fn explicit_plus_for_non_negative_decimal() {
        assert_eq!(render_int(fmt(42i32, ShowSign)), "+42");
        assert_eq!(render_int(fmt(0i32, ShowSign)), "+0");
        assert_eq!(render_int(fmt(-42i32, ShowSign)), "-42");
    }

    #[test]
    fn plain_float_uses_six_decimals_by_default() {
        assert_eq!(render_float(FloatSegment::from(1.5f64)), "1.500000");
        assert_eq!(render_float(FloatSegment::from(-0.25f32)), "-0.250000");
        assert_eq!(render_float(fmt(3.14159f64, Precision(2))), "3.14");
        assert_eq!(render_float(fmt(2.0f64, Precision(0))), "2");
        assert_eq!(render_float(fmt(2.0f64, (Precision(0), ShowPoint))), "2.");
    }

    #[test]
    fn float_sign_policies() {
        assert_eq!(render_float(fmt(1.5f64, ShowSign)), "+1.500000");
        assert_eq!(render_float(fmt(1.5f64, PadSign)), " 1.500000");
        assert_eq!(render_float(fmt(-1.5f64, ShowSign)), "-1.500000");
    }

    #[test]
    fn scientific_shape_matches_the_directive() {
        assert_eq!(render_float(fmt(1.5f64, Scientific)), "1.500000e+00");
        assert_eq!(
            render_float(fmt(1234.5f64, (Scientific, Precision(2)))),
            "1.23e+03"
        );
        assert_eq!(
            render_float(fmt(0.00015f64, (Scientific, Precision(1)))),
            "1.5e-04"
        );
        assert_eq!(
            render_float(fmt(1234.5f64, (Scientific, Precision(2), Uppercase))),
            "1.23E+03"
        );
    }

    #[test]
    fn adaptive_switches_notation_and_trims_zeros() {
        assert_eq!(render_float(fmt(100.0f64, Adaptive)), "100");
        assert_eq!(render_float(fmt(0.5f64, Adaptive)), "0.5");
        assert_eq!(render_float(fmt(0.0001f64, Adaptive)), "0.0001");
        assert_eq!(render_float(fmt(0.00001f64, Adaptive)), "1e-05");
        assert_eq!(render_float(fmt(1234567.0f64, Adaptive)), "1.23457e+06");
        assert_eq!(render_float(fmt(0.0f64, Adaptive)), "0");
        assert_eq!(
            render_float(fmt(100.0f64, (Adaptive, ShowPoint))),
            "100.000"
        );
    }

    #[test]
    fn hexadecimal_floats_from_the_bit_pattern() {
        assert_eq!(render_float(fmt(1.0f64, Hex)), "0x1p+0");
        assert_eq!(render_float(fmt(0.5f64, Hex)), "0x1p-1");
        assert_eq!(render_float(fmt(1.5f32, Hex)), "0x1.8p+0");
        assert_eq!(render_float(fmt(-2.0f64, Hex)), "-0x1p+1");
        assert_eq!(render_float(fmt(0.0f64, Hex)), "0x0p+0");
        assert_eq!(render_float(fmt(1.5f64, (Hex, Uppercase))), "0X1.8P+0");
        assert_eq!(render_float(fmt(1.0f64, (Hex, Precision(3)))), "0x1.000p+0");
        // Rounding carries into the leading digit.
        assert_eq!(render_float(fmt(1.9999f64, (Hex, Precision(0)))), "0x2p+0");
    }

    #[test]
    fn specials_follow_the_uppercase_attribute() {
        assert_eq!(render_float(FloatSegment::from(f64::NAN)), "nan");
        assert_eq!(render_float(fmt(f64::NAN, Uppercase)), "NAN");
        assert_eq!(render_float(FloatSegment::from(f64::INFINITY)), "inf");
        assert_eq!(render_float(FloatSegment::from(f64::NEG_INFINITY)), "-inf");
        assert_eq!(
            render_float(fmt(f64::INFINITY, (Uppercase, ShowSign))),
            "+INF"
        );
    }
}
