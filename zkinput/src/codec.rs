//! Fixed-width encoding of circuit input fields.
//!
//! Every field of an input record is turned into a byte array of exactly the
//! length the circuit declares for that signal. Short values are zero-padded
//! on the right, long values are truncated, and the truncation is either
//! logged or promoted to an error depending on the [`TruncationPolicy`].
//! Timestamps are the exception: they are big-endian integers, so they are
//! padded on the left and keep their low-order bytes when cut.

use crate::{
    error::{json_kind, CodecError, EncodeError},
    fields::{FieldSpec, SourceKind, FIELD_TABLE},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// What to do when a value is longer than its field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruncationPolicy {
    /// Keep the leading bytes and log a warning.
    #[default]
    Lenient,
    /// Fail the field with [`EncodeError::LengthExceeded`].
    Strict,
}

/// Truncates or right-pads `seq` with zeros so that it has exactly
/// `target_len` elements. Existing elements keep their index.
pub fn adjust_length<T: Clone + Default>(mut seq: Vec<T>, target_len: usize) -> Vec<T> {
    seq.resize(target_len, T::default());
    seq
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EncodedField {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Length of the value before it was fitted to the field.
    #[serde(skip)]
    pub original_len: usize,
}

impl EncodedField {
    fn fit(name: &str, raw: Vec<u8>, target_len: usize) -> Self {
        let original_len = raw.len();
        Self {
            name: name.to_owned(),
            bytes: adjust_length(raw, target_len),
            original_len,
        }
    }

    /// Like `fit`, but keeps the value right-aligned: zeros go in front and
    /// truncation drops the leading bytes.
    fn fit_right_aligned(name: &str, mut raw: Vec<u8>, target_len: usize) -> Self {
        let original_len = raw.len();
        let bytes = if original_len > target_len {
            raw.split_off(original_len - target_len)
        } else {
            let mut padded = vec![0; target_len - original_len];
            padded.append(&mut raw);
            padded
        };
        Self {
            name: name.to_owned(),
            bytes,
            original_len,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.original_len > self.bytes.len()
    }

    pub fn to_json(&self) -> Value {
        Value::from(self.bytes.clone())
    }
}

pub fn encode_ascii_string(
    name: &str,
    value: &Value,
    target_len: usize,
) -> Result<EncodedField, EncodeError> {
    let text = expect_str(value, SourceKind::AsciiString)?;
    let bytes = text
        .chars()
        .enumerate()
        .map(|(position, ch)| {
            if ch.is_ascii() {
                Ok(ch as u8)
            } else {
                Err(EncodeError::NonAscii { position, ch })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EncodedField::fit(name, bytes, target_len))
}

pub fn encode_hex_string(
    name: &str,
    value: &Value,
    target_len: usize,
) -> Result<EncodedField, EncodeError> {
    let text = expect_str(value, SourceKind::HexString)?;
    let bytes = decode_hex(text)?;
    Ok(EncodedField::fit(name, bytes, target_len))
}

/// Decodes hex digit pairs, stripping a literal lowercase `0x` prefix.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, EncodeError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.len() % 2 != 0 {
        return Err(EncodeError::MalformedHex {
            reason: format!("odd number of digits ({})", digits.len()),
        });
    }
    hex::decode(digits).map_err(|e| EncodeError::MalformedHex {
        reason: e.to_string(),
    })
}

pub fn encode_unix_date_big_endian(
    name: &str,
    value: &Value,
    target_len: usize,
) -> Result<EncodedField, EncodeError> {
    let text = expect_str(value, SourceKind::UnixDateBigEndian)?;
    let seconds = parse_unix_seconds(text).ok_or_else(|| EncodeError::InvalidDate {
        value: text.to_owned(),
    })?;
    Ok(EncodedField::fit_right_aligned(
        name,
        unix_seconds_be_bytes(seconds),
        target_len,
    ))
}

/// Whole seconds since the Unix epoch, rounded towards negative infinity.
///
/// Accepts RFC 3339 text, ISO date-times without an offset (read as UTC)
/// and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_unix_seconds(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.timestamp());
    }
    if let Some(naive) = NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(naive.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp())
}

/// Minimal big-endian byte form of `seconds`. Zero and negative values
/// produce no bytes at all, so they end up as an all-zero field.
pub fn unix_seconds_be_bytes(seconds: i64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8);
    let mut remaining = seconds;
    while remaining > 0 {
        bytes.push((remaining & 0xff) as u8);
        remaining >>= 8;
    }
    bytes.reverse();
    bytes
}

pub fn passthrough_bytes(
    name: &str,
    value: &Value,
    target_len: usize,
) -> Result<EncodedField, EncodeError> {
    let items = value.as_array().ok_or(EncodeError::TypeMismatch {
        expected: SourceKind::RawByteBuffer,
        found: json_kind(value),
    })?;
    let bytes = items
        .iter()
        .enumerate()
        .map(|(index, item)| to_byte(index, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(EncodedField::fit(name, bytes, target_len))
}

fn to_byte(index: usize, item: &Value) -> Result<u8, EncodeError> {
    let mismatch = |found| EncodeError::TypeMismatch {
        expected: SourceKind::RawByteBuffer,
        found,
    };
    let number = match item {
        Value::Number(number) => number,
        other => return Err(mismatch(json_kind(other))),
    };
    if !(number.is_u64() || number.is_i64()) {
        return Err(mismatch("non-integer number"));
    }
    number
        .as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| EncodeError::ByteOutOfRange {
            index,
            value: number.to_string(),
        })
}

fn expect_str(value: &Value, expected: SourceKind) -> Result<&str, EncodeError> {
    value.as_str().ok_or(EncodeError::TypeMismatch {
        expected,
        found: json_kind(value),
    })
}

/// An input record whose declared fields have all been fitted to their
/// circuit widths. Serializes as the payload handed to the prover.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EncodedRecord {
    payload: Map<String, Value>,
    #[serde(skip)]
    fields: Vec<EncodedField>,
}

impl EncodedRecord {
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    pub fn fields(&self) -> &[EncodedField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&EncodedField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn truncated_fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.fields.iter().filter(|field| field.is_truncated())
    }
}

/// Encoder for a fixed field table.
#[derive(Clone, Copy, Debug)]
pub struct FixedWidthCodec<'a> {
    specs: &'a [FieldSpec],
    truncation: TruncationPolicy,
}

impl Default for FixedWidthCodec<'static> {
    fn default() -> Self {
        Self::new(FIELD_TABLE)
    }
}

impl<'a> FixedWidthCodec<'a> {
    pub fn new(specs: &'a [FieldSpec]) -> Self {
        Self {
            specs,
            truncation: TruncationPolicy::default(),
        }
    }

    pub fn with_truncation_policy(mut self, truncation: TruncationPolicy) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn specs(&self) -> &'a [FieldSpec] {
        self.specs
    }

    pub fn truncation_policy(&self) -> TruncationPolicy {
        self.truncation
    }

    pub fn encode_field(
        &self,
        spec: &FieldSpec,
        value: &Value,
    ) -> Result<EncodedField, EncodeError> {
        let field = match spec.source_kind {
            SourceKind::AsciiString => encode_ascii_string(spec.name, value, spec.target_len),
            SourceKind::HexString => encode_hex_string(spec.name, value, spec.target_len),
            SourceKind::UnixDateBigEndian => {
                encode_unix_date_big_endian(spec.name, value, spec.target_len)
            }
            SourceKind::RawByteBuffer => passthrough_bytes(spec.name, value, spec.target_len),
        }?;

        if field.is_truncated() {
            match self.truncation {
                TruncationPolicy::Strict => {
                    return Err(EncodeError::LengthExceeded {
                        len: field.original_len,
                        target: spec.target_len,
                    })
                }
                TruncationPolicy::Lenient => warn!(
                    "{}: array exceeds expected length, got {}, expected {}; truncated",
                    spec.name, field.original_len, spec.target_len
                ),
            }
        }
        Ok(field)
    }

    /// Encodes every declared field of `raw` in table order. Keys that are
    /// not in the table are carried over untouched. Stops at the first
    /// failing field.
    pub fn encode_record(&self, raw: &Value) -> Result<EncodedRecord, CodecError> {
        let object = raw.as_object().ok_or(CodecError::NotAnObject {
            found: json_kind(raw),
        })?;

        let mut payload = object.clone();
        let mut fields = Vec::with_capacity(self.specs.len());
        for spec in self.specs {
            let value = object
                .get(spec.name)
                .ok_or_else(|| CodecError::MissingField(spec.name.to_owned()))?;
            let field = self
                .encode_field(spec, value)
                .map_err(|source| CodecError::Field {
                    field: spec.name.to_owned(),
                    source,
                })?;
            debug!(
                "{}: {} (expected {})",
                spec.name,
                field.bytes.len(),
                spec.target_len
            );
            payload.insert(spec.name.to_owned(), field.to_json());
            fields.push(field);
        }

        Ok(EncodedRecord { payload, fields })
    }
}

/// Encodes `raw` against `specs` with the lenient truncation policy.
pub fn encode_input_record(raw: &Value, specs: &[FieldSpec]) -> Result<EncodedRecord, CodecError> {
    FixedWidthCodec::new(specs).encode_record(raw)
}
