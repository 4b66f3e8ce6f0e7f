use crate::{
    codec::{EncodedRecord, FixedWidthCodec, TruncationPolicy},
    error::CodecError,
    onchain::{EthCallVerifier, OnChainVerifier},
    proof::{ProofOutput, SolidityCalldata},
    prover::{ProofGenerator, SnarkjsProver},
    response::{PipelineReport, Verdict},
    verifier::LocalVerifier,
};
use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Instant};
use tokio::fs;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainConfig {
    pub rpc_url: Url,
    pub verifier_address: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub circuit_wasm: PathBuf,
    pub proving_key: PathBuf,
    pub verification_key: Option<PathBuf>,
    /// Scratch space for the prover.
    pub work_dir: PathBuf,
    /// Where `<label>.input.json` is written, if anywhere.
    pub encoded_input_dir: Option<PathBuf>,
    /// Where `<label>.proof.json` is written, if anywhere.
    pub proof_dir: Option<PathBuf>,
    pub strict_truncation: bool,
    pub snarkjs_bin: String,
    pub on_chain: Option<OnChainConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            circuit_wasm: PathBuf::from("circuit_js/circuit.wasm"),
            proving_key: PathBuf::from("circuit_final.zkey"),
            verification_key: None,
            work_dir: std::env::temp_dir().join("zkinput"),
            encoded_input_dir: None,
            proof_dir: None,
            strict_truncation: false,
            snarkjs_bin: "snarkjs".to_string(),
            on_chain: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &std::path::Path) -> Result<Self, anyhow::Error> {
        debug!("Loading pipeline config from {}", path.display());
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn truncation_policy(&self) -> TruncationPolicy {
        if self.strict_truncation {
            TruncationPolicy::Strict
        } else {
            TruncationPolicy::Lenient
        }
    }
}

/// Encode, prove and optionally verify, one record at a time.
pub struct Pipeline<P, V> {
    config: PipelineConfig,
    prover: P,
    local_verifier: Option<LocalVerifier>,
    on_chain_verifier: Option<V>,
}

impl Pipeline<SnarkjsProver, EthCallVerifier> {
    /// Builds the snarkjs prover, plus whichever verifiers the config names.
    pub fn from_config(config: PipelineConfig) -> Result<Self, anyhow::Error> {
        let prover = SnarkjsProver::new(&config.work_dir).with_program(&config.snarkjs_bin);
        let mut pipeline = Self::new(config.clone(), prover);

        if let Some(path) = &config.verification_key {
            let verifier = LocalVerifier::from_file(path)
                .with_context(|| format!("loading verification key {}", path.display()))?;
            pipeline = pipeline.with_local_verifier(verifier);
        }
        if let Some(on_chain) = &config.on_chain {
            let verifier =
                EthCallVerifier::new(on_chain.rpc_url.clone(), &on_chain.verifier_address)?;
            pipeline = pipeline.with_on_chain_verifier(verifier);
        }
        Ok(pipeline)
    }
}

impl<P: ProofGenerator, V: OnChainVerifier> Pipeline<P, V> {
    pub fn new(config: PipelineConfig, prover: P) -> Self {
        Self {
            config,
            prover,
            local_verifier: None,
            on_chain_verifier: None,
        }
    }

    pub fn with_local_verifier(mut self, verifier: LocalVerifier) -> Self {
        self.local_verifier = Some(verifier);
        self
    }

    pub fn with_on_chain_verifier(mut self, verifier: V) -> Self {
        self.on_chain_verifier = Some(verifier);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn codec(&self) -> FixedWidthCodec<'static> {
        FixedWidthCodec::default().with_truncation_policy(self.config.truncation_policy())
    }

    pub fn encode(&self, raw: &Value) -> Result<EncodedRecord, CodecError> {
        self.codec().encode_record(raw)
    }

    async fn save_encoded(&self, label: &str, record: &EncodedRecord) -> Result<(), anyhow::Error> {
        if let Some(dir) = &self.config.encoded_input_dir {
            let path = dir.join(format!("{label}.input.json"));
            debug!("Saving encoded input to {}", path.display());
            fs::create_dir_all(dir).await?;
            fs::write(&path, serde_json::to_string_pretty(record)?).await?;
            info!("Processed input written to {}", path.display());
        }
        Ok(())
    }

    async fn save_proof(&self, label: &str, output: &ProofOutput) -> Result<(), anyhow::Error> {
        if let Some(dir) = &self.config.proof_dir {
            let path = dir.join(format!("{label}.proof.json"));
            debug!("Saving proof to {}", path.display());
            fs::create_dir_all(dir).await?;
            fs::write(&path, serde_json::to_string_pretty(output)?).await?;
            info!("Proof saved to {}", path.display());
        }
        Ok(())
    }

    /// Encodes `raw` and runs the prover on the result.
    pub async fn prove(
        &self,
        label: &str,
        raw: &Value,
    ) -> Result<(EncodedRecord, ProofOutput), anyhow::Error> {
        info!("Encoding input record {}", label);
        let record = self
            .encode(raw)
            .with_context(|| format!("encoding input record {label}"))?;
        self.save_encoded(label, &record).await?;

        let start = Instant::now();
        let output = self
            .prover
            .generate(&record, &self.config.circuit_wasm, &self.config.proving_key)
            .await
            .with_context(|| format!("generating proof for {label}"))?;
        debug!("Proof for {} generated in {:?}", label, start.elapsed());
        self.save_proof(label, &output).await?;

        Ok((record, output))
    }

    pub async fn verify_on_chain(
        &self,
        calldata: &SolidityCalldata,
    ) -> Result<Verdict, anyhow::Error> {
        match &self.on_chain_verifier {
            Some(verifier) => {
                let valid = verifier
                    .verify(calldata)
                    .await
                    .context("calling on-chain verifier")?;
                Ok(Verdict::from_result(valid, "on-chain"))
            }
            None => Ok(Verdict::Skipped),
        }
    }

    /// Encode, prove, then verify locally and on-chain if configured.
    /// Each step waits for the previous one; the first failure ends the run.
    pub async fn run(&self, label: &str, raw: &Value) -> Result<PipelineReport, anyhow::Error> {
        let (record, proof) = self.prove(label, raw).await?;

        let local = match &self.local_verifier {
            Some(verifier) => {
                let valid = verifier
                    .verify(&proof)
                    .with_context(|| format!("verifying proof for {label}"))?;
                Verdict::from_result(valid, "local")
            }
            None => Verdict::Skipped,
        };

        let on_chain = if self.on_chain_verifier.is_some() {
            let calldata = SolidityCalldata::from_proof(&proof.proof, &proof.public_signals)
                .with_context(|| format!("preparing calldata for {label}"))?;
            self.verify_on_chain(&calldata).await?
        } else {
            Verdict::Skipped
        };

        let report = PipelineReport {
            label: label.to_string(),
            truncated_fields: record
                .truncated_fields()
                .map(|field| field.name.clone())
                .collect(),
            proof,
            local,
            on_chain,
        };
        info!(
            "{}: local {:?}, on-chain {:?}",
            label, report.local, report.on_chain
        );
        Ok(report)
    }
}

impl<P, V> Pipeline<P, V>
where
    P: ProofGenerator + 'static,
    V: OnChainVerifier + 'static,
{
    /// Runs independent records concurrently, one task each. Results come
    /// back in input order.
    ///
    /// Labels name the output files, so a label seen earlier in `inputs` is
    /// not run again; that record fails instead.
    pub async fn run_many(
        self: Arc<Self>,
        inputs: Vec<(String, Value)>,
    ) -> Vec<(String, Result<PipelineReport, anyhow::Error>)> {
        let mut seen = HashSet::new();
        let handles: Vec<_> = inputs
            .into_iter()
            .map(|(label, raw)| {
                if !seen.insert(label.clone()) {
                    return (label, None);
                }
                let pipeline = Arc::clone(&self);
                let task_label = label.clone();
                let handle = tokio::spawn(async move { pipeline.run(&task_label, &raw).await });
                (label, Some(handle))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (label, handle) in handles {
            let result = match handle {
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        Err(anyhow::Error::new(e).context(format!("task for {label} failed")))
                    }
                },
                None => Err(anyhow::anyhow!("duplicate record label {label}")),
            };
            results.push((label, result));
        }
        results
    }
}
