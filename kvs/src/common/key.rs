use crate::errors::{ErrorKind, KvsError, KvsResult};
use std::borrow::Borrow;
use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter, Write};
use std::ops::Deref;

/// A logical key as supplied by the caller.
///
/// Every variant normalizes deterministically into a [CanonicalKey]:
/// - `Bytes` and `ByteBuffer` are used as-is (a buffer is copied).
/// - `Str` is UTF-8 encoded.
/// - numbers, ranges, tuples and frozen sets are rendered to text first.
///
/// Keys with equal rendered text are the same entry, so `1`, `"1"` and
/// `b"1"` all address one value.
///
/// # Usage
/// ```text
/// let k1: Key = "user:1".into();
/// let k2 = Key::from((1, "a"));       // renders as (1, 'a')
/// let k3 = key!(0..10);               // renders as range(0, 10)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Immutable byte sequence
    Bytes(Vec<u8>),
    /// Mutable byte buffer, copied on normalization
    ByteBuffer(Vec<u8>),
    /// Text
    Str(String),
    /// Boolean, rendered as `True` / `False`
    Bool(bool),
    /// Integer of any width
    Int(i128),
    /// Floating-point number
    Float(f64),
    /// Complex number
    Complex { re: f64, im: f64 },
    /// Arithmetic progression `start..stop` by `step`
    Range { start: i64, stop: i64, step: i64 },
    /// Ordered tuple
    Tuple(Vec<Key>),
    /// Unordered set; element order never affects the canonical form
    FrozenSet(Vec<Key>),
}

impl Key {
    /// Creates a range key with an explicit step.
    pub fn range(start: i64, stop: i64, step: i64) -> KvsResult<Key> {
        if step == 0 {
            log::error!("Range key step must not be zero");
            return Err(KvsError::new(
                "Range key step must not be zero",
                ErrorKind::UnsupportedKeyType,
            ));
        }
        Ok(Key::Range { start, stop, step })
    }

    /// Creates a complex number key.
    #[inline]
    pub fn complex(re: f64, im: f64) -> Key {
        Key::Complex { re, im }
    }

    /// Creates a mutable byte buffer key.
    #[inline]
    pub fn byte_buffer(buffer: &[u8]) -> Key {
        Key::ByteBuffer(buffer.to_vec())
    }

    /// Creates a frozen set key from any collection of keys.
    pub fn frozen_set<I, T>(items: I) -> Key
    where
        I: IntoIterator<Item = T>,
        T: Into<Key>,
    {
        Key::FrozenSet(items.into_iter().map(Into::into).collect())
    }

    /// Normalizes this key into its canonical byte form.
    pub fn normalize(self) -> KvsResult<CanonicalKey> {
        match self {
            Key::Bytes(bytes) | Key::ByteBuffer(bytes) => Ok(CanonicalKey(bytes)),
            Key::Str(text) => Ok(CanonicalKey(text.into_bytes())),
            other => {
                let mut text = String::new();
                other.write_repr(&mut text)?;
                Ok(CanonicalKey(text.into_bytes()))
            }
        }
    }

    /// Returns the textual form of this key as it appears inside a tuple or set.
    pub fn repr(&self) -> KvsResult<String> {
        let mut text = String::new();
        self.write_repr(&mut text)?;
        Ok(text)
    }

    fn write_repr(&self, out: &mut String) -> KvsResult<()> {
        match self {
            Key::Bytes(bytes) => write_bytes_repr(bytes, out),
            Key::ByteBuffer(bytes) => {
                out.push_str("bytearray(");
                write_bytes_repr(bytes, out);
                out.push(')');
            }
            Key::Str(text) => write_str_repr(text, out),
            Key::Bool(true) => out.push_str("True"),
            Key::Bool(false) => out.push_str("False"),
            Key::Int(value) => write!(out, "{}", value)?,
            Key::Float(value) => out.push_str(&format_float(*value, true)),
            Key::Complex { re, im } => write_complex_repr(*re, *im, out),
            Key::Range { start, stop, step } => {
                if *step == 0 {
                    log::error!("Range key step must not be zero");
                    return Err(KvsError::new(
                        "Range key step must not be zero",
                        ErrorKind::UnsupportedKeyType,
                    ));
                }
                if *step == 1 {
                    write!(out, "range({}, {})", start, stop)?;
                } else {
                    write!(out, "range({}, {}, {})", start, stop, step)?;
                }
            }
            Key::Tuple(items) => {
                out.push('(');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out)?;
                }
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Key::FrozenSet(items) => {
                let mut rendered = BTreeSet::new();
                for item in items {
                    if let Key::ByteBuffer(_) = item {
                        log::error!("A byte buffer cannot be a frozen set element");
                        return Err(KvsError::new(
                            "A byte buffer cannot be a frozen set element",
                            ErrorKind::UnsupportedKeyType,
                        ));
                    }
                    rendered.insert(item.repr()?);
                }

                if rendered.is_empty() {
                    out.push_str("frozenset()");
                } else {
                    out.push_str("frozenset({");
                    for (index, item) in rendered.iter().enumerate() {
                        if index > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(item);
                    }
                    out.push_str("})");
                }
            }
        }
        Ok(())
    }
}

/// Normalizes any supported logical key into its canonical byte form.
#[inline]
pub fn normalize(key: impl Into<Key>) -> KvsResult<CanonicalKey> {
    key.into().normalize()
}

fn write_str_repr(text: &str, out: &mut String) {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    out.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn write_bytes_repr(bytes: &[u8], out: &mut String) {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };

    out.push('b');
    out.push(quote as char);
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", byte);
            }
        }
    }
    out.push(quote as char);
}

fn write_complex_repr(re: f64, im: f64, out: &mut String) {
    let imag = format_float(im, false);
    if re == 0.0 && re.is_sign_positive() {
        out.push_str(&imag);
        out.push('j');
        return;
    }

    out.push('(');
    out.push_str(&format_float(re, false));
    if !imag.starts_with('-') {
        out.push('+');
    }
    out.push_str(&imag);
    out.push_str("j)");
}

/// Formats a float with the shortest digits that round-trip.
///
/// Decimal exponents in `[-4, 16)` use fixed notation, everything else uses
/// scientific notation with a signed exponent of at least two digits.
/// `point_zero` appends `.0` to integral fixed-notation values.
fn format_float(value: f64, point_zero: bool) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return scientific,
    };
    let exponent: i32 = match exponent.parse() {
        Ok(exponent) => exponent,
        Err(_) => return scientific,
    };

    let negative = mantissa.starts_with('-');
    let digits: String = mantissa
        .trim_start_matches('-')
        .chars()
        .filter(|c| *c != '.')
        .collect();

    let mut text = String::new();
    if negative {
        text.push('-');
    }

    if (-4..16).contains(&exponent) {
        let point = exponent + 1;
        if point <= 0 {
            text.push_str("0.");
            text.push_str(&"0".repeat(point.unsigned_abs() as usize));
            text.push_str(&digits);
        } else if point as usize >= digits.len() {
            text.push_str(&digits);
            text.push_str(&"0".repeat(point as usize - digits.len()));
            if point_zero {
                text.push_str(".0");
            }
        } else {
            let (whole, fraction) = digits.split_at(point as usize);
            text.push_str(whole);
            text.push('.');
            text.push_str(fraction);
        }
    } else {
        let (first, rest) = digits.split_at(1);
        text.push_str(first);
        if !rest.is_empty() {
            text.push('.');
            text.push_str(rest);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(text, "e{}{:02}", sign, exponent.unsigned_abs());
    }
    text
}

impl TryFrom<serde_json::Value> for Key {
    type Error = KvsError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::String(text) => Ok(Key::Str(text)),
            Value::Bool(flag) => Ok(Key::Bool(flag)),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Ok(Key::Int(int as i128))
                } else if let Some(int) = number.as_u64() {
                    Ok(Key::Int(int as i128))
                } else if let Some(float) = number.as_f64() {
                    Ok(Key::Float(float))
                } else {
                    Err(unsupported("number"))
                }
            }
            Value::Null => Err(unsupported("null")),
            Value::Array(_) => Err(unsupported("array")),
            Value::Object(_) => Err(unsupported("object")),
        }
    }
}

fn unsupported(type_name: &str) -> KvsError {
    log::error!("Unsupported key type: {}", type_name);
    KvsError::new(
        &format!("Unsupported key type: {}", type_name),
        ErrorKind::UnsupportedKeyType,
    )
}

macro_rules! int_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                #[inline]
                fn from(value: $ty) -> Self {
                    Key::Int(value as i128)
                }
            }
        )*
    };
}

int_key!(i8, u8, i16, u16, i32, u32, i64, u64, i128, isize, usize);

impl From<bool> for Key {
    #[inline]
    fn from(value: bool) -> Self {
        Key::Bool(value)
    }
}

impl From<f64> for Key {
    #[inline]
    fn from(value: f64) -> Self {
        Key::Float(value)
    }
}

impl From<f32> for Key {
    // widen through the shortest decimal so 0.1f32 stays 0.1
    fn from(value: f32) -> Self {
        Key::Float(value.to_string().parse().unwrap_or(f64::from(value)))
    }
}

impl From<char> for Key {
    #[inline]
    fn from(value: char) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<&str> for Key {
    #[inline]
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    #[inline]
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<&String> for Key {
    #[inline]
    fn from(value: &String) -> Self {
        Key::Str(value.clone())
    }
}

impl From<&[u8]> for Key {
    #[inline]
    fn from(value: &[u8]) -> Self {
        Key::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Key {
    #[inline]
    fn from(value: &[u8; N]) -> Self {
        Key::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        Key::Bytes(value)
    }
}

impl From<&mut [u8]> for Key {
    #[inline]
    fn from(value: &mut [u8]) -> Self {
        Key::ByteBuffer(value.to_vec())
    }
}

impl From<std::ops::Range<i64>> for Key {
    #[inline]
    fn from(value: std::ops::Range<i64>) -> Self {
        Key::Range {
            start: value.start,
            stop: value.end,
            step: 1,
        }
    }
}

impl From<std::ops::Range<i32>> for Key {
    #[inline]
    fn from(value: std::ops::Range<i32>) -> Self {
        Key::Range {
            start: value.start as i64,
            stop: value.end as i64,
            step: 1,
        }
    }
}

impl From<()> for Key {
    #[inline]
    fn from(_: ()) -> Self {
        Key::Tuple(Vec::new())
    }
}

macro_rules! tuple_key {
    ($($name:ident),+) => {
        impl<$($name: Into<Key>),+> From<($($name,)+)> for Key {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Key::Tuple(vec![$($name.into()),+])
            }
        }
    };
}

tuple_key!(A);
tuple_key!(A, B);
tuple_key!(A, B, C);
tuple_key!(A, B, C, D);

impl<T: Into<Key>> From<BTreeSet<T>> for Key {
    fn from(value: BTreeSet<T>) -> Self {
        Key::frozen_set(value)
    }
}

impl<T: Into<Key>> From<HashSet<T>> for Key {
    fn from(value: HashSet<T>) -> Self {
        Key::frozen_set(value)
    }
}

impl From<CanonicalKey> for Key {
    #[inline]
    fn from(value: CanonicalKey) -> Self {
        Key::Bytes(value.0)
    }
}

impl From<&CanonicalKey> for Key {
    #[inline]
    fn from(value: &CanonicalKey) -> Self {
        Key::Bytes(value.0.clone())
    }
}

/// The normalized byte form of a [Key], used for every backend operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CanonicalKey(Vec<u8>);

impl CanonicalKey {
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        CanonicalKey(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for CanonicalKey {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for CanonicalKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for CanonicalKey {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for CanonicalKey {
    fn from(value: Vec<u8>) -> Self {
        CanonicalKey(value)
    }
}

impl From<&[u8]> for CanonicalKey {
    fn from(value: &[u8]) -> Self {
        CanonicalKey(value.to_vec())
    }
}

impl From<&str> for CanonicalKey {
    fn from(value: &str) -> Self {
        CanonicalKey(value.as_bytes().to_vec())
    }
}

impl PartialEq<[u8]> for CanonicalKey {
    fn eq(&self, other: &[u8]) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CanonicalKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl Display for CanonicalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Creates a [Key] from any supported expression.
#[macro_export]
macro_rules! key {
    ($value:expr) => {
        $crate::common::Key::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(key: impl Into<Key>) -> String {
        normalize(key).unwrap().to_string()
    }

    #[test]
    fn test_bytes_are_unchanged() {
        let key = normalize(&b"\x00\xffraw"[..]).unwrap();
        assert_eq!(key.as_bytes(), b"\x00\xffraw");
    }

    #[test]
    fn test_text_is_utf8_encoded() {
        let key = normalize("héllo").unwrap();
        assert_eq!(key.as_bytes(), "héllo".as_bytes());
    }

    #[test]
    fn test_byte_buffer_is_copied() {
        let mut buffer = vec![1u8, 2, 3];
        let key = normalize(buffer.as_mut_slice()).unwrap();
        buffer[0] = 9;
        assert_eq!(key.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_integers() {
        assert_eq!(text(42), "42");
        assert_eq!(text(-7i64), "-7");
        assert_eq!(text(u64::MAX), "18446744073709551615");
        assert_eq!(text(0u8), "0");
    }

    #[test]
    fn test_booleans() {
        assert_eq!(text(true), "True");
        assert_eq!(text(false), "False");
    }

    #[test]
    fn test_floats_fixed_notation() {
        assert_eq!(text(1.0), "1.0");
        assert_eq!(text(0.1), "0.1");
        assert_eq!(text(-2.5), "-2.5");
        assert_eq!(text(0.0), "0.0");
        assert_eq!(text(-0.0), "-0.0");
        assert_eq!(text(123.0), "123.0");
        assert_eq!(text(0.0001), "0.0001");
        assert_eq!(text(1e15), "1000000000000000.0");
        assert_eq!(text(12345.678), "12345.678");
    }

    #[test]
    fn test_floats_scientific_notation() {
        assert_eq!(text(1e16), "1e+16");
        assert_eq!(text(1e-5), "1e-05");
        assert_eq!(text(1.5e-7), "1.5e-07");
        assert_eq!(text(2.5e100), "2.5e+100");
    }

    #[test]
    fn test_float_specials() {
        assert_eq!(text(f64::NAN), "nan");
        assert_eq!(text(f64::INFINITY), "inf");
        assert_eq!(text(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_f32_keeps_short_form() {
        assert_eq!(text(0.1f32), "0.1");
    }

    #[test]
    fn test_complex() {
        assert_eq!(text(Key::complex(1.0, 2.0)), "(1+2j)");
        assert_eq!(text(Key::complex(1.5, -0.5)), "(1.5-0.5j)");
        assert_eq!(text(Key::complex(0.0, 1.0)), "1j");
        assert_eq!(text(Key::complex(0.0, -3.0)), "-3j");
        assert_eq!(text(Key::complex(-0.0, 2.0)), "(-0+2j)");
    }

    #[test]
    fn test_ranges() {
        assert_eq!(text(0..10), "range(0, 10)");
        assert_eq!(text(Key::range(0, 10, 2).unwrap()), "range(0, 10, 2)");
        assert_eq!(text(Key::range(10, 0, -1).unwrap()), "range(10, 0, -1)");
    }

    #[test]
    fn test_zero_step_range_is_rejected() {
        let err = Key::range(0, 10, 0).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedKeyType);

        let err = normalize(Key::Range { start: 0, stop: 1, step: 0 }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedKeyType);
    }

    #[test]
    fn test_tuples() {
        assert_eq!(text(()), "()");
        assert_eq!(text((1,)), "(1,)");
        assert_eq!(text((1, "a")), "(1, 'a')");
        assert_eq!(text((1.0, true, 0..3)), "(1.0, True, range(0, 3))");
        assert_eq!(text(((1, 2), "x")), "((1, 2), 'x')");
    }

    #[test]
    fn test_tuple_element_quoting() {
        assert_eq!(text(("it's",)), "(\"it's\",)");
        assert_eq!(text(("say \"hi\" it's",)), "('say \"hi\" it\\'s',)");
        assert_eq!(text(("a\nb",)), "('a\\nb',)");
        assert_eq!(text((&b"a'\x01"[..],)), "(b\"a'\\x01\",)");
        assert_eq!(text((Key::byte_buffer(b"ab"),)), "(bytearray(b'ab'),)");
    }

    #[test]
    fn test_frozen_sets_are_order_independent() {
        let a = normalize(Key::frozen_set(vec![3, 1, 2])).unwrap();
        let b = normalize(Key::frozen_set(vec![2, 3, 1])).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "frozenset({1, 2, 3})");
    }

    #[test]
    fn test_frozen_set_dedups_and_empty() {
        assert_eq!(text(Key::frozen_set(vec![1, 1])), "frozenset({1})");
        assert_eq!(text(Key::frozen_set(Vec::<i32>::new())), "frozenset()");

        let set: BTreeSet<&str> = ["b", "a"].into_iter().collect();
        assert_eq!(text(set), "frozenset({'a', 'b'})");
    }

    #[test]
    fn test_frozen_set_rejects_byte_buffer() {
        let err = normalize(Key::frozen_set(vec![Key::byte_buffer(b"x")])).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedKeyType);
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let first = normalize((1, "a", 2.5)).unwrap();
        for _ in 0..10 {
            assert_eq!(normalize((1, "a", 2.5)).unwrap(), first);
        }
    }

    #[test]
    fn test_intentional_collisions() {
        let from_int = normalize(1).unwrap();
        let from_str = normalize("1").unwrap();
        let from_bytes = normalize(&b"1"[..]).unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_str, from_bytes);
    }

    #[test]
    fn test_canonical_key_round_trips_as_key() {
        let canonical = normalize((1, 2)).unwrap();
        assert_eq!(normalize(canonical.clone()).unwrap(), canonical);
    }

    #[test]
    fn test_json_keys() {
        use serde_json::json;

        assert_eq!(Key::try_from(json!("a")).unwrap(), Key::Str("a".into()));
        assert_eq!(Key::try_from(json!(5)).unwrap(), Key::Int(5));
        assert_eq!(Key::try_from(json!(1.5)).unwrap(), Key::Float(1.5));
        assert_eq!(Key::try_from(json!(true)).unwrap(), Key::Bool(true));
    }

    #[test]
    fn test_json_keys_fail_closed() {
        use serde_json::json;

        for value in [json!(null), json!([1, 2]), json!({"a": 1})] {
            let err = Key::try_from(value).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::UnsupportedKeyType);
        }
    }

    #[test]
    fn test_key_macro() {
        assert_eq!(key!("a"), Key::Str("a".to_string()));
        assert_eq!(key!(3u16), Key::Int(3));
    }

    #[test]
    fn test_canonical_key_comparisons() {
        let key = CanonicalKey::from("abc");
        assert!(key == "abc");
        assert_eq!(&*key, b"abc");
        assert!(CanonicalKey::from("a") < CanonicalKey::from("b"));
    }
}
