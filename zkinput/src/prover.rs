use crate::{
    codec::EncodedRecord,
    error::ProverError,
    proof::{Groth16Proof, ProofOutput},
};
use async_trait::async_trait;
use log::{debug, info};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tokio::{fs, process::Command};

/// Turns an encoded input record into a Groth16 proof and its public
/// signals, given the compiled circuit and the proving key.
#[async_trait]
pub trait ProofGenerator: Send + Sync {
    async fn generate(
        &self,
        record: &EncodedRecord,
        circuit_artifact: &Path,
        proving_key: &Path,
    ) -> Result<ProofOutput, ProverError>;
}

#[async_trait]
impl<T: ProofGenerator + ?Sized> ProofGenerator for Arc<T> {
    async fn generate(
        &self,
        record: &EncodedRecord,
        circuit_artifact: &Path,
        proving_key: &Path,
    ) -> Result<ProofOutput, ProverError> {
        (**self).generate(record, circuit_artifact, proving_key).await
    }
}

/// Runs `snarkjs groth16 fullprove` in a scratch directory under `work_dir`.
#[derive(Clone, Debug)]
pub struct SnarkjsProver {
    program: String,
    work_dir: PathBuf,
}

impl SnarkjsProver {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: "snarkjs".to_string(),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

async fn ensure_exists(path: &Path) -> Result<(), ProverError> {
    match fs::try_exists(path).await {
        Ok(true) => Ok(()),
        _ => Err(ProverError::MissingArtifact(path.to_path_buf())),
    }
}

#[async_trait]
impl ProofGenerator for SnarkjsProver {
    async fn generate(
        &self,
        record: &EncodedRecord,
        circuit_artifact: &Path,
        proving_key: &Path,
    ) -> Result<ProofOutput, ProverError> {
        ensure_exists(circuit_artifact).await?;
        ensure_exists(proving_key).await?;

        fs::create_dir_all(&self.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("fullprove-")
            .tempdir_in(&self.work_dir)?;
        let input_path = scratch.path().join("input.json");
        let proof_path = scratch.path().join("proof.json");
        let public_path = scratch.path().join("public.json");
        fs::write(&input_path, serde_json::to_vec(record)?).await?;

        debug!(
            "Running {} groth16 fullprove in {}",
            self.program,
            scratch.path().display()
        );
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(["groth16", "fullprove"])
            .arg(&input_path)
            .arg(circuit_artifact)
            .arg(proving_key)
            .arg(&proof_path)
            .arg(&public_path)
            .output()
            .await
            .map_err(|source| ProverError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ProverError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            debug!("{} stderr: {}", self.program, stderr);
        }

        let proof: Groth16Proof = serde_json::from_slice(&fs::read(&proof_path).await?)?;
        let public_signals: Vec<String> = serde_json::from_slice(&fs::read(&public_path).await?)?;
        info!(
            "Proof generated with {} public signals in {:?}",
            public_signals.len(),
            start.elapsed()
        );

        Ok(ProofOutput {
            proof,
            public_signals,
        })
    }
}
