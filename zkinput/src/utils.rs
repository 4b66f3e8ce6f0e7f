use ark_ff::{BigInteger, FpParameters, PrimeField};
use num_bigint::BigUint;

pub fn field_to_string<F: PrimeField>(f: F) -> String {
    let big_int = BigUint::from_bytes_le(&f.into_repr().to_bytes_le());
    big_int.to_string()
}

/// Parses a canonical decimal field element. Values at or above the modulus
/// are rejected rather than reduced.
pub fn field_from_string<F: PrimeField>(s: &str) -> Result<F, anyhow::Error> {
    let big_int = BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| anyhow::anyhow!("Failed to parse decimal string {:?}", s))?;
    let modulus = BigUint::from_bytes_le(&F::Params::MODULUS.to_bytes_le());
    if big_int >= modulus {
        anyhow::bail!("{} is not below the field modulus", s);
    }
    let bytes = big_int.to_bytes_le();
    F::from_random_bytes(&bytes).ok_or_else(|| anyhow::anyhow!("Failed to parse field element"))
}

pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Left-pads the big-endian form of `value` to a 32-byte EVM word.
pub fn to_word(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut word = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    word[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
    word
}
