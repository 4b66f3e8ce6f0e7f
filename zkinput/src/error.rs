use crate::fields::SourceKind;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to encode a single field value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("expected {expected} but got {found}")]
    TypeMismatch {
        expected: SourceKind,
        found: &'static str,
    },
    #[error("non-ASCII character {ch:?} at position {position}")]
    NonAscii { position: usize, ch: char },
    #[error("malformed hex string: {reason}")]
    MalformedHex { reason: String },
    #[error("invalid date {value:?}")]
    InvalidDate { value: String },
    #[error("element {index} is not a byte value: {value}")]
    ByteOutOfRange { index: usize, value: String },
    #[error("array exceeds expected length: got {len}, expected {target}")]
    LengthExceeded { len: usize, target: usize },
}

/// Failure to encode an input record, attributed to the offending field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("input record must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
    #[error("field `{0}` is missing from the input record")]
    MissingField(String),
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: EncodeError,
    },
}

impl CodecError {
    pub fn field(&self) -> Option<&str> {
        match self {
            CodecError::NotAnObject { .. } => None,
            CodecError::MissingField(field) | CodecError::Field { field, .. } => Some(field),
        }
    }
}

/// Proof element that cannot be handed to the verifier contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalldataError {
    #[error("proof is missing element {0}")]
    MissingElement(String),
    #[error("proof element {name} is not a decimal integer: {value:?}")]
    InvalidElement { name: String, value: String },
    #[error("proof element {name} is not a canonical BN254 field element")]
    OutOfField { name: String },
    #[error("invalid verifier address {0:?}")]
    InvalidAddress(String),
}

/// Failure surfaced from the external proof generator.
#[derive(Debug, Error)]
pub enum ProverError {
    #[error("proving artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("proof generation exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("prover I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("prover produced unreadable output: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of the remote verifier call. A proof the contract rejects is not
/// an error; it is reported as `Ok(false)`.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed RPC response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Calldata(#[from] CalldataError),
}

/// Failure of off-chain Groth16 verification.
#[derive(Debug, Error)]
pub enum LocalVerifyError {
    #[error("verification key I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("verification key is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported proof system {protocol}/{curve}")]
    Unsupported { protocol: String, curve: String },
    #[error("invalid {what}: {detail}")]
    InvalidEncoding { what: &'static str, detail: String },
    #[error("expected {expected} public signals, got {got}")]
    SignalCount { expected: usize, got: usize },
    #[error("groth16 verifier error: {0}")]
    Groth16(String),
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
