//! Off-chain verification of snarkjs Groth16 proofs over BN254.
//!
//! snarkjs writes points as projective decimal coordinates, normalised so
//! that `z` is `1` (or `0` for the point at infinity), and Fq2 elements as
//! `[c0, c1]`. These are mapped onto the arkworks types and checked with
//! the arkworks Groth16 verifier.

use crate::{
    error::LocalVerifyError,
    proof::{Groth16Proof, ProofOutput},
    utils::{field_from_string, field_to_string},
};
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ff::Zero;
use ark_groth16::{Groth16, Proof, VerifyingKey};
use ark_snark::SNARK;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Instant};

/// `verification_key.json` as exported by `snarkjs zkey export verificationkey`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsVerifyingKey {
    pub protocol: String,
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: Vec<String>,
    pub vk_beta_2: Vec<Vec<String>>,
    pub vk_gamma_2: Vec<Vec<String>>,
    pub vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

pub struct LocalVerifier {
    verification_key: VerifyingKey<Bn254>,
}

impl LocalVerifier {
    pub fn from_file(path: &Path) -> Result<Self, LocalVerifyError> {
        debug!("Loading verification key from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        let key: SnarkjsVerifyingKey = serde_json::from_str(&json)?;
        let verifier = Self::from_snarkjs(&key)?;
        info!("Verification key loaded successfully");
        Ok(verifier)
    }

    pub fn from_snarkjs(key: &SnarkjsVerifyingKey) -> Result<Self, LocalVerifyError> {
        check_system(&key.protocol, &key.curve)?;
        if key.ic.len() != key.n_public + 1 {
            return Err(LocalVerifyError::InvalidEncoding {
                what: "verification key",
                detail: format!("{} IC points for {} public inputs", key.ic.len(), key.n_public),
            });
        }

        let verification_key = VerifyingKey {
            alpha_g1: g1_from_coords("vk_alpha_1", &key.vk_alpha_1)?,
            beta_g2: g2_from_coords("vk_beta_2", &key.vk_beta_2)?,
            gamma_g2: g2_from_coords("vk_gamma_2", &key.vk_gamma_2)?,
            delta_g2: g2_from_coords("vk_delta_2", &key.vk_delta_2)?,
            gamma_abc_g1: key
                .ic
                .iter()
                .map(|point| g1_from_coords("IC", point))
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(Self { verification_key })
    }

    pub fn num_public_inputs(&self) -> usize {
        self.verification_key.gamma_abc_g1.len() - 1
    }

    pub fn verify(&self, output: &ProofOutput) -> Result<bool, LocalVerifyError> {
        debug!("Verifying proof");
        let start = Instant::now();

        if output.public_signals.len() != self.num_public_inputs() {
            return Err(LocalVerifyError::SignalCount {
                expected: self.num_public_inputs(),
                got: output.public_signals.len(),
            });
        }
        let proof = proof_from_snarkjs(&output.proof)?;
        let inputs: Vec<Fr> = output
            .public_signals
            .iter()
            .map(|s| scalar("public signal", s))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Inputs: {:?}", output.public_signals);

        let result = Groth16::<Bn254>::verify(&self.verification_key, &inputs, &proof)
            .map_err(|e| LocalVerifyError::Groth16(e.to_string()))?;
        info!("Proof verification result: {} ({:?})", result, start.elapsed());
        Ok(result)
    }
}

pub fn proof_from_snarkjs(proof: &Groth16Proof) -> Result<Proof<Bn254>, LocalVerifyError> {
    check_system(&proof.protocol, &proof.curve)?;
    Ok(Proof {
        a: g1_from_coords("pi_a", &proof.pi_a)?,
        b: g2_from_coords("pi_b", &proof.pi_b)?,
        c: g1_from_coords("pi_c", &proof.pi_c)?,
    })
}

pub fn proof_to_snarkjs(proof: &Proof<Bn254>) -> Groth16Proof {
    Groth16Proof {
        pi_a: g1_to_coords(&proof.a),
        pi_b: g2_to_coords(&proof.b),
        pi_c: g1_to_coords(&proof.c),
        protocol: "groth16".to_string(),
        curve: "bn128".to_string(),
    }
}

pub fn verifying_key_to_snarkjs(vk: &VerifyingKey<Bn254>) -> SnarkjsVerifyingKey {
    SnarkjsVerifyingKey {
        protocol: "groth16".to_string(),
        curve: "bn128".to_string(),
        n_public: vk.gamma_abc_g1.len().saturating_sub(1),
        vk_alpha_1: g1_to_coords(&vk.alpha_g1),
        vk_beta_2: g2_to_coords(&vk.beta_g2),
        vk_gamma_2: g2_to_coords(&vk.gamma_g2),
        vk_delta_2: g2_to_coords(&vk.delta_g2),
        ic: vk.gamma_abc_g1.iter().map(g1_to_coords).collect(),
    }
}

fn check_system(protocol: &str, curve: &str) -> Result<(), LocalVerifyError> {
    if protocol == "groth16" && matches!(curve, "bn128" | "bn254") {
        Ok(())
    } else {
        Err(LocalVerifyError::Unsupported {
            protocol: protocol.to_string(),
            curve: curve.to_string(),
        })
    }
}

fn invalid(what: &'static str, detail: impl Into<String>) -> LocalVerifyError {
    LocalVerifyError::InvalidEncoding {
        what,
        detail: detail.into(),
    }
}

fn base(what: &'static str, s: &str) -> Result<Fq, LocalVerifyError> {
    field_from_string(s).map_err(|e| invalid(what, e.to_string()))
}

fn scalar(what: &'static str, s: &str) -> Result<Fr, LocalVerifyError> {
    field_from_string(s).map_err(|e| invalid(what, e.to_string()))
}

fn g1_from_coords(what: &'static str, coords: &[String]) -> Result<G1Affine, LocalVerifyError> {
    let [x, y, z] = coords else {
        return Err(invalid(what, format!("expected 3 coordinates, got {}", coords.len())));
    };
    match z.as_str() {
        "0" => return Ok(G1Affine::zero()),
        "1" => {}
        other => return Err(invalid(what, format!("point is not normalised (z = {other})"))),
    }
    let point = G1Affine::new(base(what, x)?, base(what, y)?, false);
    if !point.is_on_curve() {
        return Err(invalid(what, "point is not on the curve"));
    }
    Ok(point)
}

fn fq2(what: &'static str, limbs: &[String]) -> Result<Fq2, LocalVerifyError> {
    let [c0, c1] = limbs else {
        return Err(invalid(what, format!("expected 2 limbs, got {}", limbs.len())));
    };
    Ok(Fq2::new(base(what, c0)?, base(what, c1)?))
}

fn g2_from_coords(
    what: &'static str,
    coords: &[Vec<String>],
) -> Result<G2Affine, LocalVerifyError> {
    let [x, y, z] = coords else {
        return Err(invalid(what, format!("expected 3 coordinates, got {}", coords.len())));
    };
    let z = fq2(what, z)?;
    if z.is_zero() {
        return Ok(G2Affine::zero());
    }
    if z != Fq2::new(Fq::from(1u64), Fq::zero()) {
        return Err(invalid(what, "point is not normalised"));
    }
    let point = G2Affine::new(fq2(what, x)?, fq2(what, y)?, false);
    if !point.is_on_curve() {
        return Err(invalid(what, "point is not on the curve"));
    }
    // G2 has a cofactor, unlike G1.
    if !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(invalid(what, "point is not in the prime-order subgroup"));
    }
    Ok(point)
}

fn g1_to_coords(point: &G1Affine) -> Vec<String> {
    if point.infinity {
        return vec!["0".into(), "1".into(), "0".into()];
    }
    vec![field_to_string(point.x), field_to_string(point.y), "1".into()]
}

fn g2_to_coords(point: &G2Affine) -> Vec<Vec<String>> {
    let limbs = |f: Fq2| vec![field_to_string(f.c0), field_to_string(f.c1)];
    if point.infinity {
        return vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ];
    }
    vec![limbs(point.x), limbs(point.y), vec!["1".into(), "0".into()]]
}
