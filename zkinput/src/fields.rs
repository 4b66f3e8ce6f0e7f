use serde::{Deserialize, Serialize};
use std::fmt;

/// How the raw JSON value of a field is turned into bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Text, one byte per ASCII character.
    AsciiString,
    /// Text of hex digit pairs, with an optional `0x` prefix.
    HexString,
    /// Date/time text, encoded as big-endian Unix seconds.
    UnixDateBigEndian,
    /// An array of integers already in byte form.
    RawByteBuffer,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::AsciiString => "ASCII string",
            SourceKind::HexString => "hex string",
            SourceKind::UnixDateBigEndian => "date string",
            SourceKind::RawByteBuffer => "byte array",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub source_kind: SourceKind,
    pub target_len: usize,
}

impl FieldSpec {
    pub const fn new(name: &'static str, source_kind: SourceKind, target_len: usize) -> Self {
        Self {
            name,
            source_kind,
            target_len,
        }
    }
}

/// Signal layout of the circuit, in the order the fields are encoded.
pub const FIELD_TABLE: &[FieldSpec] = &[
    FieldSpec::new("user", SourceKind::AsciiString, 8),
    FieldSpec::new("game", SourceKind::AsciiString, 16),
    FieldSpec::new("character", SourceKind::AsciiString, 12),
    FieldSpec::new("ability", SourceKind::AsciiString, 10),
    FieldSpec::new("place", SourceKind::AsciiString, 10),
    FieldSpec::new("place2", SourceKind::AsciiString, 10),
    FieldSpec::new("uploader", SourceKind::HexString, 20),
    FieldSpec::new("timestamp", SourceKind::UnixDateBigEndian, 8),
    FieldSpec::new("hash_inputdata", SourceKind::RawByteBuffer, 32),
];

pub fn find_field(name: &str) -> Option<&'static FieldSpec> {
    FIELD_TABLE.iter().find(|spec| spec.name == name)
}
