use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, Proof, VerifyingKey};
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use ark_std::test_rng;
use zkinput::{
    error::LocalVerifyError,
    proof::ProofOutput,
    utils::field_to_string,
    verifier::{proof_from_snarkjs, proof_to_snarkjs, verifying_key_to_snarkjs, LocalVerifier},
};

/// Knowledge of `x` such that `x * x == y`, with `y` public.
#[derive(Clone)]
struct SquareCircuit {
    x: Fr,
    y: Fr,
}

impl ConstraintSynthesizer<Fr> for SquareCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let y_var = FpVar::new_input(cs.clone(), || Ok(self.y))?;
        let x_var = FpVar::new_witness(cs, || Ok(self.x))?;
        let square = &x_var * &x_var;
        square.enforce_equal(&y_var)?;
        Ok(())
    }
}

fn prove_square(x: u64) -> (VerifyingKey<Bn254>, Proof<Bn254>, Fr) {
    let mut rng = test_rng();
    let setup_circuit = SquareCircuit {
        x: Fr::from(0u64),
        y: Fr::from(0u64),
    };
    let (pk, vk) = Groth16::<Bn254>::setup(setup_circuit, &mut rng).unwrap();

    let y = Fr::from(x * x);
    let circuit = SquareCircuit { x: Fr::from(x), y };
    let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).unwrap();
    (vk, proof, y)
}

#[test]
fn verifies_a_proof_in_snarkjs_form() {
    let (vk, proof, y) = prove_square(3);
    let key = verifying_key_to_snarkjs(&vk);
    assert_eq!(key.n_public, 1);
    assert_eq!(key.ic.len(), 2);

    let verifier = LocalVerifier::from_snarkjs(&key).unwrap();
    let output = ProofOutput {
        proof: proof_to_snarkjs(&proof),
        public_signals: vec![field_to_string(y)],
    };
    assert_eq!(output.public_signals, vec!["9"]);
    assert!(verifier.verify(&output).unwrap());
}

#[test]
fn wrong_public_signal_is_rejected() {
    let (vk, proof, _) = prove_square(3);
    let verifier = LocalVerifier::from_snarkjs(&verifying_key_to_snarkjs(&vk)).unwrap();
    let output = ProofOutput {
        proof: proof_to_snarkjs(&proof),
        public_signals: vec!["10".to_string()],
    };
    assert!(!verifier.verify(&output).unwrap());
}

#[test]
fn signal_count_must_match_key() {
    let (vk, proof, y) = prove_square(4);
    let verifier = LocalVerifier::from_snarkjs(&verifying_key_to_snarkjs(&vk)).unwrap();
    let output = ProofOutput {
        proof: proof_to_snarkjs(&proof),
        public_signals: vec![field_to_string(y), "1".to_string()],
    };
    assert!(matches!(
        verifier.verify(&output),
        Err(LocalVerifyError::SignalCount {
            expected: 1,
            got: 2
        })
    ));
}

#[test]
fn snarkjs_form_maps_back_to_the_same_proof() {
    let (_, proof, _) = prove_square(5);
    let snarkjs = proof_to_snarkjs(&proof);
    assert_eq!(snarkjs.pi_a[2], "1");
    assert_eq!(snarkjs.pi_b[2], vec!["1", "0"]);
    assert_eq!(proof_from_snarkjs(&snarkjs).unwrap(), proof);
}

#[test]
fn loads_verification_key_file() {
    let (vk, proof, y) = prove_square(6);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verification_key.json");
    std::fs::write(
        &path,
        serde_json::to_string_pretty(&verifying_key_to_snarkjs(&vk)).unwrap(),
    )
    .unwrap();

    let verifier = LocalVerifier::from_file(&path).unwrap();
    let output = ProofOutput {
        proof: proof_to_snarkjs(&proof),
        public_signals: vec![field_to_string(y)],
    };
    assert!(verifier.verify(&output).unwrap());

    assert!(matches!(
        LocalVerifier::from_file(&dir.path().join("missing.json")),
        Err(LocalVerifyError::Io(_))
    ));
}
