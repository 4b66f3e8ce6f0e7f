use crate::error::CalldataError;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Order of the BN254 scalar field. Public signals must be below it.
pub const BN254_SCALAR_MODULUS: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

/// Order of the BN254 base field. Curve point coordinates must be below it.
pub const BN254_BASE_MODULUS: &str =
    "21888242871839275222246405745257275088696311157297823662689037894645226208583";

static SCALAR_MODULUS: LazyLock<BigUint> = LazyLock::new(|| parse_modulus(BN254_SCALAR_MODULUS));
static BASE_MODULUS: LazyLock<BigUint> = LazyLock::new(|| parse_modulus(BN254_BASE_MODULUS));

fn parse_modulus(literal: &str) -> BigUint {
    BigUint::parse_bytes(literal.as_bytes(), 10).expect("modulus literal is decimal")
}

/// Groth16 proof in the JSON shape snarkjs writes to `proof.json`.
/// Points are projective with decimal coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_curve")]
    pub curve: String,
}

fn default_protocol() -> String {
    "groth16".to_string()
}

fn default_curve() -> String {
    "bn128".to_string()
}

/// What the proof generator hands back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutput {
    pub proof: Groth16Proof,
    pub public_signals: Vec<String>,
}

/// Arguments of a Solidity Groth16 verifier's `verifyProof`, validated
/// against the BN254 field moduli.
///
/// `b` holds the G2 limbs swapped relative to snarkjs' `pi_b`, which is the
/// order the EVM pairing precompile expects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolidityCalldata {
    pub a: [BigUint; 2],
    pub b: [[BigUint; 2]; 2],
    pub c: [BigUint; 2],
    pub inputs: Vec<BigUint>,
}

impl SolidityCalldata {
    pub fn from_proof(
        proof: &Groth16Proof,
        public_signals: &[String],
    ) -> Result<Self, CalldataError> {
        let coord = |name: String, value: Option<&String>| -> Result<BigUint, CalldataError> {
            let value = value.ok_or_else(|| CalldataError::MissingElement(name.clone()))?;
            parse_element(&name, value, &*BASE_MODULUS)
        };
        let b_limb = |row: usize, col: usize| {
            coord(
                format!("pi_b[{row}][{col}]"),
                proof.pi_b.get(row).and_then(|limbs| limbs.get(col)),
            )
        };

        Ok(Self {
            a: [
                coord("pi_a[0]".into(), proof.pi_a.first())?,
                coord("pi_a[1]".into(), proof.pi_a.get(1))?,
            ],
            b: [[b_limb(0, 1)?, b_limb(0, 0)?], [b_limb(1, 1)?, b_limb(1, 0)?]],
            c: [
                coord("pi_c[0]".into(), proof.pi_c.first())?,
                coord("pi_c[1]".into(), proof.pi_c.get(1))?,
            ],
            inputs: public_signals
                .iter()
                .enumerate()
                .map(|(i, signal)| {
                    parse_element(&format!("publicSignals[{i}]"), signal, &SCALAR_MODULUS)
                })
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    /// Flat object with `_pA0`, `_pB01`, ..., `_pubSignals0` keys, as printed
    /// by the proof-only command.
    pub fn to_flat_json(&self) -> Value {
        let mut object = Map::new();
        for (key, value) in self.flat_entries() {
            object.insert(key, Value::String(value.to_string()));
        }
        Value::Object(object)
    }

    pub fn from_flat_json(value: &Value) -> Result<Self, CalldataError> {
        let get = |key: &str, modulus: &BigUint| -> Result<BigUint, CalldataError> {
            let text = value
                .get(key)
                .and_then(Value::as_str)
                .ok_or_else(|| CalldataError::MissingElement(key.to_string()))?;
            parse_element(key, text, modulus)
        };
        let base = &*BASE_MODULUS;

        let mut inputs = Vec::new();
        while value.get(format!("_pubSignals{}", inputs.len())).is_some() {
            inputs.push(get(&format!("_pubSignals{}", inputs.len()), &*SCALAR_MODULUS)?);
        }
        if inputs.is_empty() {
            return Err(CalldataError::MissingElement("_pubSignals0".to_string()));
        }

        Ok(Self {
            a: [get("_pA0", base)?, get("_pA1", base)?],
            b: [
                [get("_pB00", base)?, get("_pB01", base)?],
                [get("_pB10", base)?, get("_pB11", base)?],
            ],
            c: [get("_pC0", base)?, get("_pC1", base)?],
            inputs,
        })
    }

    /// All arguments in ABI order: a, b, c, inputs.
    pub fn words(&self) -> impl Iterator<Item = &BigUint> {
        self.a
            .iter()
            .chain(self.b.iter().flatten())
            .chain(self.c.iter())
            .chain(self.inputs.iter())
    }

    fn flat_entries(&self) -> Vec<(String, &BigUint)> {
        let mut entries = vec![
            ("_pA0".to_string(), &self.a[0]),
            ("_pA1".to_string(), &self.a[1]),
            ("_pB00".to_string(), &self.b[0][0]),
            ("_pB01".to_string(), &self.b[0][1]),
            ("_pB10".to_string(), &self.b[1][0]),
            ("_pB11".to_string(), &self.b[1][1]),
            ("_pC0".to_string(), &self.c[0]),
            ("_pC1".to_string(), &self.c[1]),
        ];
        entries.extend(
            self.inputs
                .iter()
                .enumerate()
                .map(|(i, input)| (format!("_pubSignals{i}"), input)),
        );
        entries
    }
}

fn parse_element(name: &str, value: &str, modulus: &BigUint) -> Result<BigUint, CalldataError> {
    let parsed = BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(|| {
        CalldataError::InvalidElement {
            name: name.to_string(),
            value: value.to_string(),
        }
    })?;
    if &parsed >= modulus {
        return Err(CalldataError::OutOfField {
            name: name.to_string(),
        });
    }
    Ok(parsed)
}
