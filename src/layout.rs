/// Beacon layout language compiler.
///
/// A layout describes where each field of a beacon advertisement lives.
/// It is a comma-separated list of terms:
///
/// | Term                 | Field                                   |
/// |----------------------|-----------------------------------------|
/// | `m:S-E=HEX`          | matcher (type code), exactly one        |
/// | `i:S-E` / `i:S-El`   | identifier, one or more, ordered        |
/// | `p:S-E`              | tx power, exactly one                   |
/// | `d:S-E[b|l]`         | data value, any number, ordered         |
/// | `s:S-E=HEX`          | 16/32-bit service UUID, at most one     |
///
/// Offsets are inclusive and absolute: bytes 0-1 are the company code (or
/// service UUID) that precedes the beacon payload over the air. No offset
/// may exceed [`MAX_OFFSET`].
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::defaults::MAX_OFFSET;
use crate::error::LayoutError;
use crate::identifier::decode_hex;

/// Kind of a layout field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Matcher,
    Identifier,
    Power,
    Data,
    ServiceUuid,
}

/// One compiled layout term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    /// First byte of the field (absolute offset)
    pub start: usize,
    /// Last byte of the field, inclusive
    pub end: usize,
    pub little_endian: bool,
    /// Expected bytes, big-endian and fitted to the field width.
    /// Present for matcher and service UUID fields only.
    pub match_bytes: Option<Vec<u8>>,
}

impl FieldSpec {
    #[inline]
    pub fn width(&self) -> usize {
        self.end - self.start + 1
    }
}

/// A validated layout: exactly one matcher and power field, at least one
/// identifier, at most one service UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDescriptor {
    source: String,
    fields: Vec<FieldSpec>,
    matcher: usize,
    power: usize,
    service_uuid: Option<usize>,
}

impl LayoutDescriptor {
    /// The layout text this descriptor was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn matcher(&self) -> &FieldSpec {
        &self.fields[self.matcher]
    }

    pub fn power(&self) -> &FieldSpec {
        &self.fields[self.power]
    }

    pub fn service_uuid(&self) -> Option<&FieldSpec> {
        self.service_uuid.map(|i| &self.fields[i])
    }

    /// Identifier fields in significance order.
    pub fn identifiers(&self) -> impl Iterator<Item = &FieldSpec> {
        self.of_kind(FieldKind::Identifier)
    }

    pub fn data_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.of_kind(FieldKind::Data)
    }

    pub fn identifier_count(&self) -> usize {
        self.identifiers().count()
    }

    pub fn data_count(&self) -> usize {
        self.data_fields().count()
    }

    /// Beacon type code: the matcher bytes read as a big-endian integer.
    pub fn type_code(&self) -> u64 {
        be_value(self.matcher().match_bytes.as_deref().unwrap_or_default())
    }

    /// Value of the `s:` field, if the layout has one.
    pub fn service_uuid_value(&self) -> Option<u32> {
        self.service_uuid()
            .and_then(|f| f.match_bytes.as_deref())
            .map(|bytes| be_value(bytes) as u32)
    }

    /// Highest inclusive end offset over all fields.
    pub fn last_offset(&self) -> usize {
        self.fields.iter().map(|f| f.end).max().unwrap_or(0)
    }

    fn of_kind(&self, kind: FieldKind) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(move |f| f.kind == kind)
    }
}

impl FromStr for LayoutDescriptor {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        compile(s)
    }
}

impl fmt::Display for LayoutDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile a layout description.
///
/// Terms are checked in order; the first malformed term aborts compilation.
/// Whitespace around a term is ignored.
pub fn compile(layout: &str) -> Result<LayoutDescriptor, LayoutError> {
    let mut fields: Vec<FieldSpec> = Vec::new();
    let mut matcher = None;
    let mut power = None;
    let mut service_uuid = None;

    for raw in layout.split(',') {
        let field = parse_term(raw.trim())?;
        let index = fields.len();
        match field.kind {
            FieldKind::Matcher => {
                if matcher.replace(index).is_some() {
                    return Err(LayoutError::DuplicateMatcher);
                }
            }
            FieldKind::Power => {
                if power.replace(index).is_some() {
                    return Err(LayoutError::DuplicatePower);
                }
            }
            FieldKind::ServiceUuid => {
                if service_uuid.replace(index).is_some() {
                    return Err(LayoutError::DuplicateServiceUuid);
                }
            }
            FieldKind::Identifier | FieldKind::Data => {}
        }
        fields.push(field);
    }

    let matcher = matcher.ok_or(LayoutError::MissingMatcher)?;
    let power = power.ok_or(LayoutError::MissingPower)?;
    if !fields.iter().any(|f| f.kind == FieldKind::Identifier) {
        return Err(LayoutError::MissingIdentifier);
    }

    log::debug!("Compiled layout '{}' into {} fields", layout, fields.len());

    Ok(LayoutDescriptor {
        source: String::from(layout),
        fields,
        matcher,
        power,
        service_uuid,
    })
}

fn parse_term(term: &str) -> Result<FieldSpec, LayoutError> {
    let invalid = || LayoutError::InvalidTerm(String::from(term));

    let (prefix, body) = term.split_once(':').ok_or_else(invalid)?;
    let kind = match prefix {
        "m" => FieldKind::Matcher,
        "i" => FieldKind::Identifier,
        "p" => FieldKind::Power,
        "d" => FieldKind::Data,
        "s" => FieldKind::ServiceUuid,
        _ => return Err(invalid()),
    };

    let (range, value) = match kind {
        FieldKind::Matcher | FieldKind::ServiceUuid => {
            let (range, value) = body.split_once('=').ok_or_else(invalid)?;
            (range, Some(value))
        }
        _ => (body, None),
    };

    // Endianness suffix: `l` on identifiers, `b` or `l` on data
    let (range, little_endian) = match kind {
        FieldKind::Identifier => match range.strip_suffix('l') {
            Some(r) => (r, true),
            None => (range, false),
        },
        FieldKind::Data => {
            if let Some(r) = range.strip_suffix('l') {
                (r, true)
            } else if let Some(r) = range.strip_suffix('b') {
                (r, false)
            } else {
                (range, false)
            }
        }
        _ => (range, false),
    };

    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let start = parse_offset(term, start)?;
    let end = parse_offset(term, end)?;
    if start > end {
        return Err(LayoutError::InvalidRange {
            term: String::from(term),
            start,
            end,
        });
    }

    let match_bytes = match value {
        Some(hex) => Some(fit_value(term, kind, hex, end - start + 1)?),
        None => None,
    };

    Ok(FieldSpec {
        kind,
        start,
        end,
        little_endian,
        match_bytes,
    })
}

fn parse_offset(term: &str, digits: &str) -> Result<usize, LayoutError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LayoutError::InvalidTerm(String::from(term)));
    }
    match digits.parse::<usize>() {
        Ok(offset) if offset <= MAX_OFFSET => Ok(offset),
        _ => Err(LayoutError::InvalidOffset(String::from(term))),
    }
}

/// Decode a `=HEX` value and fit it big-endian into `width` bytes.
fn fit_value(term: &str, kind: FieldKind, hex: &str, width: usize) -> Result<Vec<u8>, LayoutError> {
    let mut bytes =
        decode_hex(hex.as_bytes()).ok_or_else(|| LayoutError::InvalidHex(String::from(term)))?;

    // Leading zero bytes beyond the field width carry no value
    while bytes.len() > width && bytes[0] == 0 {
        bytes.remove(0);
    }
    if bytes.len() > width {
        return Err(LayoutError::ValueTooWide(String::from(term)));
    }

    let significant = bytes.iter().skip_while(|&&b| b == 0).count();
    if kind == FieldKind::ServiceUuid && significant > 4 {
        return Err(LayoutError::ValueTooWide(String::from(term)));
    }

    let mut fitted = Vec::with_capacity(width);
    fitted.resize(width - bytes.len(), 0);
    fitted.extend_from_slice(&bytes);
    Ok(fitted)
}

/// Read bytes as an unsigned big-endian integer. Inputs longer than eight
/// bytes keep their low-order eight bytes.
pub(crate) fn be_value(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
