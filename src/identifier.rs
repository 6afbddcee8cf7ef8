/// Variable-length beacon identifiers.
///
/// An identifier is an immutable, non-empty byte string. Its canonical text
/// form depends only on its length: 2-byte identifiers print as decimal,
/// 16-byte identifiers as a dashed UUID, everything else as `0x` hex.
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::{self, Write};
use core::str::FromStr;

use crate::error::{FormatError, ParseError, RangeError};

/// Hex digit group lengths of a UUID (8-4-4-4-12).
const UUID_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// A beacon identifier (UUID, major, minor, namespace, instance, ...).
///
/// Ordering puts shorter identifiers first; identifiers of equal length
/// compare byte-by-byte as unsigned values.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    bytes: Vec<u8>,
}

impl Identifier {
    /// Parse identifier text.
    ///
    /// Accepted forms, tried in order:
    /// - `0x` followed by any number of hex digits (odd counts are
    ///   left-padded with a zero nibble)
    /// - a UUID, 8-4-4-4-12 hex digits, each dash optional
    /// - a decimal integer in `0..=65535`, stored as 2 bytes big-endian
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        if let Some(hex) = text.strip_prefix("0x") {
            return decode_hex(hex.as_bytes())
                .map(|bytes| Self { bytes })
                .ok_or_else(|| ParseError(String::from(text)));
        }

        if let Some(id) = parse_uuid(text) {
            return Ok(id);
        }

        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = text.parse::<u16>() {
                return Ok(Self::from_u16(value));
            }
        }

        Err(ParseError(String::from(text)))
    }

    /// Copy `buf[start..end]`, reversing the bytes for little-endian fields.
    pub fn from_bytes(
        buf: &[u8],
        start: usize,
        end: usize,
        little_endian: bool,
    ) -> Result<Self, RangeError> {
        if start >= end || end > buf.len() {
            return Err(RangeError {
                start,
                end,
                len: buf.len(),
            });
        }
        let mut bytes = buf[start..end].to_vec();
        if little_endian {
            bytes.reverse();
        }
        Ok(Self { bytes })
    }

    /// Identifier holding exactly the given bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RangeError> {
        Self::from_bytes(bytes, 0, bytes.len(), false)
    }

    /// 2-byte big-endian identifier (major/minor style).
    pub fn from_u16(value: u16) -> Self {
        Self {
            bytes: value.to_be_bytes().to_vec(),
        }
    }

    pub fn from_uuid_bytes(uuid: [u8; 16]) -> Self {
        Self {
            bytes: uuid.to_vec(),
        }
    }

    /// Caller guarantees `bytes` is non-empty.
    pub(crate) fn from_vec(bytes: Vec<u8>) -> Self {
        debug_assert!(!bytes.is_empty());
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_count(&self) -> usize {
        self.bytes.len()
    }

    /// `0x`-prefixed lowercase hex, regardless of length.
    pub fn to_hex_string(&self) -> String {
        let mut s = String::with_capacity(2 + self.bytes.len() * 2);
        let _ = write_hex(&mut s, &self.bytes);
        s
    }

    /// Dashed lowercase UUID. Only 16-byte identifiers qualify.
    pub fn to_uuid_string(&self) -> Result<String, FormatError> {
        if self.bytes.len() != 16 {
            return Err(FormatError::NotUuid(self.bytes.len()));
        }
        let mut s = String::with_capacity(36);
        let _ = write_uuid(&mut s, &self.bytes);
        Ok(s)
    }

    /// Integer value of a 2-byte identifier.
    pub fn to_u16(&self) -> Result<u16, FormatError> {
        match self.bytes.as_slice() {
            [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
            other => Err(FormatError::NotInteger(other.len())),
        }
    }
}

impl FromStr for Identifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes
            .len()
            .cmp(&other.bytes.len())
            .then_with(|| self.bytes.cmp(&other.bytes))
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes.as_slice() {
            [hi, lo] => write!(f, "{}", u16::from_be_bytes([*hi, *lo])),
            uuid if uuid.len() == 16 => write_uuid(f, uuid),
            other => write_hex(f, other),
        }
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({self})")
    }
}

fn write_hex<W: Write>(out: &mut W, bytes: &[u8]) -> fmt::Result {
    out.write_str("0x")?;
    for b in bytes {
        write!(out, "{b:02x}")?;
    }
    Ok(())
}

fn write_uuid<W: Write>(out: &mut W, bytes: &[u8]) -> fmt::Result {
    for (i, b) in bytes.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.write_char('-')?;
        }
        write!(out, "{b:02x}")?;
    }
    Ok(())
}

fn parse_uuid(text: &str) -> Option<Identifier> {
    let mut rest = text.as_bytes();
    let mut digits: Vec<u8> = Vec::with_capacity(32);

    for (i, &len) in UUID_GROUPS.iter().enumerate() {
        if i > 0 && rest.first() == Some(&b'-') {
            rest = &rest[1..];
        }
        if rest.len() < len {
            return None;
        }
        let (group, tail) = rest.split_at(len);
        if !group.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }
        digits.extend_from_slice(group);
        rest = tail;
    }

    if !rest.is_empty() {
        return None;
    }
    decode_hex(&digits).map(Identifier::from_vec)
}

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode hex digits into bytes, left-padding odd counts with a zero nibble.
/// Returns `None` for empty input or a non-hex character.
pub(crate) fn decode_hex(digits: &[u8]) -> Option<Vec<u8>> {
    if digits.is_empty() {
        return None;
    }

    let mut bytes = Vec::with_capacity(digits.len().div_ceil(2));
    let pairs = if digits.len() % 2 == 1 {
        bytes.push(hex_nibble(digits[0])?);
        &digits[1..]
    } else {
        digits
    };

    for pair in pairs.chunks_exact(2) {
        bytes.push((hex_nibble(pair[0])? << 4) | hex_nibble(pair[1])?);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use proptest::prelude::*;

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_hex_form() {
        let id = Identifier::parse("0x0102030405").unwrap();
        assert_eq!(id.as_bytes(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn parse_hex_odd_length_is_left_padded() {
        let id = Identifier::parse("0xabc").unwrap();
        assert_eq!(id.as_bytes(), &[0x0a, 0xbc]);
    }

    #[test]
    fn parse_hex_is_case_insensitive() {
        let lower = Identifier::parse("0xabcdef").unwrap();
        let upper = Identifier::parse("0xABCDEF").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn parse_hex_rejects_empty_and_garbage() {
        assert!(Identifier::parse("0x").is_err());
        assert!(Identifier::parse("0xzz").is_err());
    }

    #[test]
    fn parse_dashed_uuid() {
        let id = Identifier::parse("2f234454-cf6d-4a0f-adf2-f4911ba9ffa6").unwrap();
        assert_eq!(id.byte_count(), 16);
        assert_eq!(id.as_bytes()[0], 0x2f);
        assert_eq!(id.as_bytes()[15], 0xa6);
    }

    #[test]
    fn parse_uuid_without_dashes() {
        let dashed = Identifier::parse("2f234454-cf6d-4a0f-adf2-f4911ba9ffa6").unwrap();
        let bare = Identifier::parse("2F234454CF6D4A0FADF2F4911BA9FFA6").unwrap();
        assert_eq!(dashed, bare);
    }

    #[test]
    fn parse_uuid_rejects_wrong_grouping() {
        assert!(Identifier::parse("2f23445-4cf6d-4a0f-adf2-f4911ba9ffa6").is_err());
        assert!(Identifier::parse("2f234454-cf6d-4a0f-adf2-f4911ba9ffa6ff").is_err());
    }

    #[test]
    fn parse_decimal() {
        let id = Identifier::parse("258").unwrap();
        assert_eq!(id.as_bytes(), &[0x01, 0x02]);
        assert_eq!(Identifier::parse("0").unwrap().as_bytes(), &[0, 0]);
        assert_eq!(Identifier::parse("65535").unwrap().as_bytes(), &[0xff, 0xff]);
    }

    #[test]
    fn parse_decimal_out_of_range() {
        assert!(Identifier::parse("65536").is_err());
        assert!(Identifier::parse("-1").is_err());
        assert!(Identifier::parse("+5").is_err());
    }

    #[test]
    fn parse_garbage() {
        let err = Identifier::parse("beacon").unwrap_err();
        assert_eq!(err, ParseError("beacon".to_string()));
        assert!(Identifier::parse("").is_err());
    }

    #[test]
    fn from_str_matches_parse() {
        let id: Identifier = "0x0a0b".parse().unwrap();
        assert_eq!(id, Identifier::parse("0x0a0b").unwrap());
    }

    // ── Buffer construction ─────────────────────────────────────────

    #[test]
    fn from_bytes_big_endian() {
        let buf = [0u8, 1, 2, 3, 4];
        let id = Identifier::from_bytes(&buf, 1, 4, false).unwrap();
        assert_eq!(id.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn from_bytes_little_endian_reverses() {
        let buf = [0u8, 1, 2, 3, 4];
        let id = Identifier::from_bytes(&buf, 1, 4, true).unwrap();
        assert_eq!(id.as_bytes(), &[3, 2, 1]);
    }

    #[test]
    fn from_bytes_range_errors() {
        let buf = [0u8; 4];
        assert!(Identifier::from_bytes(&buf, 2, 2, false).is_err());
        assert!(Identifier::from_bytes(&buf, 3, 2, false).is_err());
        let err = Identifier::from_bytes(&buf, 0, 5, false).unwrap_err();
        assert_eq!(err, RangeError { start: 0, end: 5, len: 4 });
    }

    #[test]
    fn from_slice_rejects_empty() {
        assert!(Identifier::from_slice(&[]).is_err());
    }

    // ── Text forms ──────────────────────────────────────────────────

    #[test]
    fn display_two_bytes_as_decimal() {
        assert_eq!(Identifier::from_u16(1).to_string(), "1");
        assert_eq!(Identifier::from_u16(65535).to_string(), "65535");
    }

    #[test]
    fn display_sixteen_bytes_as_uuid() {
        let text = "2f234454-cf6d-4a0f-adf2-f4911ba9ffa6";
        assert_eq!(Identifier::parse(text).unwrap().to_string(), text);
    }

    #[test]
    fn display_other_lengths_as_hex() {
        let id = Identifier::from_slice(&[0x0c, 0x0b, 0x0a, 0x09, 0x08, 0x07]).unwrap();
        assert_eq!(id.to_string(), "0x0c0b0a090807");
        assert_eq!(Identifier::from_slice(&[0xff]).unwrap().to_string(), "0xff");
    }

    #[test]
    fn hex_string_for_any_length() {
        assert_eq!(Identifier::from_u16(0x0102).to_hex_string(), "0x0102");
    }

    #[test]
    fn uuid_and_integer_accessors() {
        assert_eq!(Identifier::from_u16(7).to_u16(), Ok(7));
        assert_eq!(
            Identifier::from_slice(&[1, 2, 3]).unwrap().to_u16(),
            Err(FormatError::NotInteger(3))
        );
        assert_eq!(
            Identifier::from_u16(7).to_uuid_string(),
            Err(FormatError::NotUuid(2))
        );
        let uuid = Identifier::from_uuid_bytes([0xaa; 16]);
        assert_eq!(
            uuid.to_uuid_string().unwrap(),
            "aaaaaaaa-aaaa-aaaa-aaaa-aaaaaaaaaaaa"
        );
    }

    // ── Ordering ────────────────────────────────────────────────────

    #[test]
    fn shorter_identifier_sorts_first() {
        let short = Identifier::from_slice(&[0xff, 0xff, 0xff, 0xff]).unwrap();
        let long = Identifier::from_slice(&[0, 0, 0, 0, 0, 0]).unwrap();
        assert!(short < long);
    }

    #[test]
    fn equal_length_compares_unsigned_bytes() {
        let a = Identifier::from_slice(&[0x01, 0xff]).unwrap();
        let b = Identifier::from_slice(&[0x80, 0x00]).unwrap();
        assert!(a < b);
        assert_eq!(a.cmp(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn sorting_mixed_lengths() {
        let mut ids = vec![
            Identifier::from_slice(&[0, 0, 0]).unwrap(),
            Identifier::from_u16(9),
            Identifier::from_slice(&[0xff]).unwrap(),
            Identifier::from_u16(2),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(rendered, ["0xff", "2", "9", "0x000000"]);
    }

    // ── Properties ──────────────────────────────────────────────────

    proptest! {
        #[test]
        fn prop_four_bytes_always_less_than_six(
            a in proptest::array::uniform4(any::<u8>()),
            b in proptest::array::uniform6(any::<u8>()),
        ) {
            let short = Identifier::from_slice(&a).unwrap();
            let long = Identifier::from_slice(&b).unwrap();
            prop_assert!(short < long);
        }

        #[test]
        fn prop_two_byte_text_round_trip(value in any::<u16>()) {
            let id = Identifier::from_u16(value);
            prop_assert_eq!(Identifier::parse(&id.to_string()).unwrap(), id);
        }

        #[test]
        fn prop_uuid_text_round_trip(bytes in proptest::array::uniform16(any::<u8>())) {
            let id = Identifier::from_uuid_bytes(bytes);
            prop_assert_eq!(Identifier::parse(&id.to_string()).unwrap(), id);
        }

        #[test]
        fn prop_hex_text_round_trip(bytes in proptest::collection::vec(any::<u8>(), 1..32)) {
            let id = Identifier::from_slice(&bytes).unwrap();
            prop_assert_eq!(Identifier::parse(&id.to_hex_string()).unwrap(), id);
        }
    }
}
