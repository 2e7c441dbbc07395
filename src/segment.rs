//! The segment model: every log line is a packed sequence of typed segments.
//!
//! Each segment starts with a word-sized tag identifying its kind; the
//! consumer dispatches on the tag, and every kind has a fixed encoded size
//! known to both sides, so the stream needs no per-segment length field.
//! Dynamic text is logged as an owned [`String`] whose backing allocation is
//! handed to the consumer inside the record; string slices must be `'static`
//! so the referenced bytes outlive the drain.

use std::ffi::CStr;
use std::mem::ManuallyDrop;

/// Wire tags. A tag of zero never occurs in a committed record.
pub const TAG_LITERAL: u64 = 1;
pub const TAG_OWNED: u64 = 2;
pub const TAG_INT: u64 = 3;
pub const TAG_FLOAT: u64 = 4;

/// Encoded sizes per kind, tag included.
pub const LITERAL_SEGMENT_SIZE: usize = 24;
pub const OWNED_SEGMENT_SIZE: usize = 32;
pub const INT_SEGMENT_SIZE: usize = 24;
pub const FLOAT_SEGMENT_SIZE: usize = 32;

/// Literal length sentinel: the referenced bytes are NUL-terminated and the
/// consumer must scan for the terminator.
pub const UNTERMINATED: u64 = u64::MAX;

/// Float precision bit pattern meaning "unspecified, use the default".
pub const PRECISION_UNSPECIFIED: u64 = 0b11111;

pub const SIGN_SHOW_IF_NEGATIVE: u64 = 0;
pub const SIGN_SHOW_ALWAYS: u64 = 1;
pub const SIGN_PAD_IF_POSITIVE: u64 = 2;

pub const DISPLAY_PLAIN: u64 = 0;
pub const DISPLAY_SCIENTIFIC: u64 = 1;
pub const DISPLAY_HEXADECIMAL: u64 = 2;
pub const DISPLAY_ADAPTIVE: u64 = 3;

macro_rules! bit_range {
    ($get:ident, $set:ident, $lo:expr, $hi:expr) => {
        #[inline(always)]
        pub fn $get(self) -> u64 {
            (self.0 >> $lo) & ((1u64 << ($hi - $lo + 1)) - 1)
        }

        #[inline(always)]
        pub fn $set(&mut self, value: u64) {
            let mask = ((1u64 << ($hi - $lo + 1)) - 1) << $lo;
            self.0 = (self.0 & !mask) | ((value << $lo) & mask);
        }
    };
}

/// Packed rendering attributes of an integer segment.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct IntAttributes(pub u64);

impl IntAttributes {
    bit_range!(length_log2, set_length_log2, 0, 1);
    bit_range!(is_unsigned, set_is_unsigned, 2, 2);
    bit_range!(is_hex, set_is_hex, 3, 3);
    bit_range!(is_uppercase, set_is_uppercase, 4, 4);
    bit_range!(show_sign, set_show_sign, 5, 5);
    bit_range!(is_left_aligned, set_is_left_aligned, 37, 37);
    bit_range!(padded_length, set_padded_length, 38, 42);
    bit_range!(padding_codepoint, set_padding_codepoint, 43, 63);
}

/// Packed rendering attributes of a float segment.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct FloatAttributes(pub u64);

impl FloatAttributes {
    bit_range!(length_log2, set_length_log2, 0, 3);
    bit_range!(sign_handling, set_sign_handling, 4, 5);
    bit_range!(is_uppercase, set_is_uppercase, 6, 6);
    bit_range!(display_style, set_display_style, 7, 8);
    bit_range!(always_show_decimal_point, set_always_show_decimal_point, 9, 9);
    bit_range!(precision, set_precision, 10, 14);
}

/// An integer value widened into its raw cell, plus its attributes.
#[derive(Clone, Copy, Debug)]
pub struct IntSegment {
    pub attrs: IntAttributes,
    pub raw: [u8; 8],
}

/// A float value widened into its raw cell, plus its attributes. The cell is
/// sized for extended floats; `f32`/`f64` occupy the low bytes.
#[derive(Clone, Copy, Debug)]
pub struct FloatSegment {
    pub attrs: FloatAttributes,
    pub raw: [u8; 16],
}

/// One typed piece of a log line, built at the call site and serialized into
/// the producer's ring buffer.
pub enum Segment {
    Literal { addr: *const u8, len: u64 },
    Owned(String),
    Int(IntSegment),
    Float(FloatSegment),
}

impl Segment {
    /// Exact number of bytes [`encode`](Self::encode) will write.
    pub fn encoded_size(&self) -> usize {
        match self {
            Segment::Literal { .. } => LITERAL_SEGMENT_SIZE,
            Segment::Owned(_) => OWNED_SEGMENT_SIZE,
            Segment::Int(_) => INT_SEGMENT_SIZE,
            Segment::Float(_) => FLOAT_SEGMENT_SIZE,
        }
    }

    /// Serializes the segment into `buf` and returns the bytes written.
    ///
    /// Encoding an owned string transfers ownership of its allocation into
    /// the record; the consumer reassembles and releases it after writing.
    pub fn encode(self, buf: &mut [u8]) -> usize {
        match self {
            Segment::Literal { addr, len } => {
                put_u64(buf, 0, TAG_LITERAL);
                put_u64(buf, 8, addr as u64);
                put_u64(buf, 16, len);
                LITERAL_SEGMENT_SIZE
            }
            Segment::Owned(string) => {
                let mut string = ManuallyDrop::new(string);
                put_u64(buf, 0, TAG_OWNED);
                put_u64(buf, 8, string.as_mut_ptr() as u64);
                put_u64(buf, 16, string.len() as u64);
                put_u64(buf, 24, string.capacity() as u64);
                OWNED_SEGMENT_SIZE
            }
            Segment::Int(segment) => {
                put_u64(buf, 0, TAG_INT);
                put_u64(buf, 8, segment.attrs.0);
                buf[16..24].copy_from_slice(&segment.raw);
                INT_SEGMENT_SIZE
            }
            Segment::Float(segment) => {
                put_u64(buf, 0, TAG_FLOAT);
                put_u64(buf, 8, segment.attrs.0);
                buf[16..32].copy_from_slice(&segment.raw);
                FLOAT_SEGMENT_SIZE
            }
        }
    }
}

#[inline(always)]
pub(crate) fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
}

#[inline(always)]
pub(crate) fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_ne_bytes(word)
}

/// Conversion into a [`Segment`], implemented for everything `log!` accepts.
pub trait IntoSegment {
    fn into_segment(self) -> Segment;
}

impl IntoSegment for Segment {
    fn into_segment(self) -> Segment {
        self
    }
}

impl IntoSegment for &'static str {
    fn into_segment(self) -> Segment {
        Segment::Literal {
            addr: self.as_ptr(),
            len: self.len() as u64,
        }
    }
}

impl IntoSegment for &'static CStr {
    fn into_segment(self) -> Segment {
        Segment::Literal {
            addr: self.as_ptr() as *const u8,
            len: UNTERMINATED,
        }
    }
}

impl IntoSegment for String {
    fn into_segment(self) -> Segment {
        Segment::Owned(self)
    }
}

impl IntoSegment for &String {
    fn into_segment(self) -> Segment {
        Segment::Owned(self.clone())
    }
}

impl IntoSegment for bool {
    fn into_segment(self) -> Segment {
        if self {
            "true".into_segment()
        } else {
            "false".into_segment()
        }
    }
}

impl IntoSegment for IntSegment {
    fn into_segment(self) -> Segment {
        Segment::Int(self)
    }
}

impl IntoSegment for FloatSegment {
    fn into_segment(self) -> Segment {
        Segment::Float(self)
    }
}

/// Values that [`fmt`] can attach attributes to.
pub trait Formattable {
    type Formatted;
    fn into_formatted(self) -> Self::Formatted;
}

impl Formattable for IntSegment {
    type Formatted = IntSegment;
    fn into_formatted(self) -> IntSegment {
        self
    }
}

impl Formattable for FloatSegment {
    type Formatted = FloatSegment;
    fn into_formatted(self) -> FloatSegment {
        self
    }
}

macro_rules! integer_segments {
    ($($ty:ty => $unsigned:expr),+ $(,)?) => {$(
        impl From<$ty> for IntSegment {
            #[inline]
            fn from(value: $ty) -> Self {
                let mut attrs = IntAttributes::default();
                attrs.set_length_log2(std::mem::size_of::<$ty>().trailing_zeros() as u64);
                attrs.set_is_unsigned($unsigned);
                let mut raw = [0u8; 8];
                raw[..std::mem::size_of::<$ty>()].copy_from_slice(&value.to_ne_bytes());
                IntSegment { attrs, raw }
            }
        }

        impl IntoSegment for $ty {
            #[inline]
            fn into_segment(self) -> Segment {
                Segment::Int(IntSegment::from(self))
            }
        }

        impl Formattable for $ty {
            type Formatted = IntSegment;
            #[inline]
            fn into_formatted(self) -> IntSegment {
                IntSegment::from(self)
            }
        }
    )+};
}

integer_segments! {
    i8 => 0, u8 => 1,
    i16 => 0, u16 => 1,
    i32 => 0, u32 => 1,
    i64 => 0, u64 => 1,
    isize => 0, usize => 1,
}

macro_rules! float_segments {
    ($($ty:ty),+ $(,)?) => {$(
        impl From<$ty> for FloatSegment {
            #[inline]
            fn from(value: $ty) -> Self {
                let mut attrs = FloatAttributes::default();
                attrs.set_length_log2(std::mem::size_of::<$ty>().trailing_zeros() as u64);
                attrs.set_precision(PRECISION_UNSPECIFIED);
                let mut raw = [0u8; 16];
                raw[..std::mem::size_of::<$ty>()].copy_from_slice(&value.to_ne_bytes());
                FloatSegment { attrs, raw }
            }
        }

        impl IntoSegment for $ty {
            #[inline]
            fn into_segment(self) -> Segment {
                Segment::Float(FloatSegment::from(self))
            }
        }

        impl Formattable for $ty {
            type Formatted = FloatSegment;
            #[inline]
            fn into_formatted(self) -> FloatSegment {
                FloatSegment::from(self)
            }
        }
    )+};
}

float_segments!(f32, f64);

/// Attaches formatting attributes to a value, producing the segment to pass
/// to `log!`. Attributes combine as tuples:
///
/// ```ignore
/// log!("scan=", fmt(0x2Cu16, (Hex, Padding::new(4, '0'), Uppercase)));
/// ```
pub fn fmt<V, A>(value: V, attrs: A) -> V::Formatted
where
    V: Formattable,
    A: ApplyAttrs<V::Formatted>,
{
    let mut segment = value.into_formatted();
    attrs.apply(&mut segment);
    segment
}

/// An attribute (or tuple of attributes) applicable to a segment kind.
pub trait ApplyAttrs<S> {
    fn apply(&self, segment: &mut S);
}

impl<S> ApplyAttrs<S> for () {
    fn apply(&self, _segment: &mut S) {}
}

macro_rules! apply_attrs_tuple {
    ($($name:ident)+) => {
        impl<S, $($name: ApplyAttrs<S>),+> ApplyAttrs<S> for ($($name,)+) {
            #[allow(non_snake_case)]
            fn apply(&self, segment: &mut S) {
                let ($($name,)+) = self;
                $($name.apply(segment);)+
            }
        }
    };
}

apply_attrs_tuple!(A);
apply_attrs_tuple!(A B);
apply_attrs_tuple!(A B C);
apply_attrs_tuple!(A B C D);
apply_attrs_tuple!(A B C D E);

/// Hexadecimal rendering: base 16 for integers, `%a`-style for floats.
pub struct Hex;

impl ApplyAttrs<IntSegment> for Hex {
    fn apply(&self, segment: &mut IntSegment) {
        segment.attrs.set_is_hex(1);
    }
}

impl ApplyAttrs<FloatSegment> for Hex {
    fn apply(&self, segment: &mut FloatSegment) {
        segment.attrs.set_display_style(DISPLAY_HEXADECIMAL);
    }
}

/// Uppercase digits, exponent and special-value letters.
pub struct Uppercase;

impl ApplyAttrs<IntSegment> for Uppercase {
    fn apply(&self, segment: &mut IntSegment) {
        segment.attrs.set_is_uppercase(1);
    }
}

impl ApplyAttrs<FloatSegment> for Uppercase {
    fn apply(&self, segment: &mut FloatSegment) {
        segment.attrs.set_is_uppercase(1);
    }
}

/// Emit `+` for non-negative values.
pub struct ShowSign;

impl ApplyAttrs<IntSegment> for ShowSign {
    fn apply(&self, segment: &mut IntSegment) {
        segment.attrs.set_show_sign(1);
    }
}

impl ApplyAttrs<FloatSegment> for ShowSign {
    fn apply(&self, segment: &mut FloatSegment) {
        segment.attrs.set_sign_handling(SIGN_SHOW_ALWAYS);
    }
}

/// Emit a space where the sign of a non-negative float would go.
pub struct PadSign;

impl ApplyAttrs<FloatSegment> for PadSign {
    fn apply(&self, segment: &mut FloatSegment) {
        segment.attrs.set_sign_handling(SIGN_PAD_IF_POSITIVE);
    }
}

/// Scientific (exponent) float notation.
pub struct Scientific;

impl ApplyAttrs<FloatSegment> for Scientific {
    fn apply(&self, segment: &mut FloatSegment) {
        segment.attrs.set_display_style(DISPLAY_SCIENTIFIC);
    }
}

/// Adaptive float notation: fixed or scientific, whichever is shorter for
/// the requested significance, with trailing zeros removed.
pub struct Adaptive;

impl ApplyAttrs<FloatSegment> for Adaptive {
    fn apply(&self, segment: &mut FloatSegment) {
        segment.attrs.set_display_style(DISPLAY_ADAPTIVE);
    }
}

/// Always emit a decimal point, even with no fractional digits.
pub struct ShowPoint;

impl ApplyAttrs<FloatSegment> for ShowPoint {
    fn apply(&self, segment: &mut FloatSegment) {
        segment.attrs.set_always_show_decimal_point(1);
    }
}

/// Float precision, clamped to the representable range 0..=30.
pub struct Precision(pub u32);

impl ApplyAttrs<FloatSegment> for Precision {
    fn apply(&self, segment: &mut FloatSegment) {
        segment.attrs.set_precision(self.0.min(30) as u64);
    }
}

/// Minimum field width for integers, with the fill character and alignment.
pub struct Padding {
    width: u32,
    fill: char,
    left_aligned: bool,
}

impl Padding {
    pub fn new(width: u32, fill: char) -> Self {
        Self {
            width,
            fill,
            left_aligned: false,
        }
    }

    pub fn left_aligned(mut self) -> Self {
        self.left_aligned = true;
        self
    }
}

impl ApplyAttrs<IntSegment> for Padding {
    fn apply(&self, segment: &mut IntSegment) {
        segment
            .attrs
            .set_is_left_aligned(self.left_aligned as u64);
        segment.attrs.set_padded_length(self.width.min(31) as u64);
        segment
            .attrs
            .set_padding_codepoint(self.fill as u64 & 0x1f_ffff);
    }
}
