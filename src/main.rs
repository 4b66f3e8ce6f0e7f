use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn, LevelFilter};
use serde_json::Value;
use url::Url;
use zkinput::{
    codec::FixedWidthCodec,
    onchain::{EthCallVerifier, OnChainVerifier},
    pipeline::{OnChainConfig, Pipeline, PipelineConfig},
    proof::SolidityCalldata,
    response::{PipelineReport, Verdict},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with pipeline settings; flags override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Reject values longer than their field instead of truncating them
    #[arg(long, global = true)]
    strict: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProveArgs {
    /// Input records, one JSON object per file
    inputs: Vec<PathBuf>,
    #[arg(long)]
    wasm: Option<PathBuf>,
    #[arg(long)]
    zkey: Option<PathBuf>,
    #[arg(long)]
    snarkjs: Option<String>,
    #[arg(long)]
    work_dir: Option<PathBuf>,
    /// Write each encoded record here as `<name>.input.json`
    #[arg(long)]
    encoded_dir: Option<PathBuf>,
    /// Write each proof here as `<name>.proof.json`
    #[arg(long)]
    proof_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode input records without proving
    Encode {
        /// Input records, one JSON object per file
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Write `<name>.input.json` files here instead of printing them
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Generate proofs and print Solidity calldata as JSON
    Prove {
        #[command(flatten)]
        prove: ProveArgs,
    },
    /// Generate proofs and verify them against a verification key
    ProveVerify {
        #[command(flatten)]
        prove: ProveArgs,
        #[arg(long)]
        vkey: Option<PathBuf>,
    },
    /// Verify proofs with the on-chain verifier contract
    VerifyOnchain {
        #[command(flatten)]
        prove: ProveArgs,
        #[arg(long)]
        rpc_url: Option<Url>,
        #[arg(long)]
        verifier: Option<String>,
        /// Flat calldata JSON as printed by `prove`; skips proving
        #[arg(long, conflicts_with = "inputs")]
        proof: Option<PathBuf>,
    },
}

fn load_config(cli_config: Option<&Path>, strict: bool) -> Result<PipelineConfig, anyhow::Error> {
    let mut config = match cli_config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    config.strict_truncation |= strict;
    Ok(config)
}

impl ProveArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(wasm) = &self.wasm {
            config.circuit_wasm = wasm.clone();
        }
        if let Some(zkey) = &self.zkey {
            config.proving_key = zkey.clone();
        }
        if let Some(snarkjs) = &self.snarkjs {
            config.snarkjs_bin = snarkjs.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            config.work_dir = work_dir.clone();
        }
        if self.encoded_dir.is_some() {
            config.encoded_input_dir = self.encoded_dir.clone();
        }
        if self.proof_dir.is_some() {
            config.proof_dir = self.proof_dir.clone();
        }
    }
}

fn label_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_json(path: &Path) -> Result<Value, anyhow::Error> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

/// File stems, with `-2`, `-3`, ... appended to repeats so that no two
/// inputs write to the same output files.
fn unique_labels(paths: &[PathBuf]) -> Vec<String> {
    let mut used = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let stem = label_for(path);
            let mut label = stem.clone();
            let mut n = 1;
            while !used.insert(label.clone()) {
                n += 1;
                label = format!("{stem}-{n}");
            }
            label
        })
        .collect()
}

fn read_inputs(paths: &[PathBuf]) -> Result<Vec<(String, Value)>, anyhow::Error> {
    if paths.is_empty() {
        anyhow::bail!("no input files given");
    }
    unique_labels(paths)
        .into_iter()
        .zip(paths)
        .map(|(label, path)| Ok((label, read_json(path)?)))
        .collect()
}

fn encode(
    config: &PipelineConfig,
    inputs: &[PathBuf],
    out_dir: Option<&Path>,
) -> Result<ExitCode, anyhow::Error> {
    let codec = FixedWidthCodec::default().with_truncation_policy(config.truncation_policy());
    for (label, raw) in read_inputs(inputs)? {
        let record = codec
            .encode_record(&raw)
            .with_context(|| format!("encoding {label}"))?;

        let json = serde_json::to_string_pretty(&record)?;
        match out_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{label}.input.json"));
                std::fs::write(&path, json)?;
                info!("Processed input written to {}", path.display());
            }
            None => println!("{json}"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Runs every input through the pipeline and hands each report to
/// `on_report`. Fails the process if any record fails or is rejected.
async fn run_pipeline(
    config: PipelineConfig,
    inputs: &[PathBuf],
    on_report: impl Fn(&PipelineReport) -> Result<(), anyhow::Error>,
) -> Result<ExitCode, anyhow::Error> {
    let inputs = read_inputs(inputs)?;
    let pipeline = Arc::new(Pipeline::from_config(config)?);
    if summarize(pipeline.run_many(inputs).await, on_report) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Logs every result and returns whether all of them were accepted. A failed,
/// rejected or unprintable record does not stop the rest from being reported.
fn summarize(
    results: Vec<(String, Result<PipelineReport, anyhow::Error>)>,
    on_report: impl Fn(&PipelineReport) -> Result<(), anyhow::Error>,
) -> bool {
    let mut all_accepted = true;
    for (label, result) in results {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("{}: {:#}", label, e);
                all_accepted = false;
                continue;
            }
        };
        if let Err(e) = on_report(&report) {
            error!("{}: {:#}", label, e);
            all_accepted = false;
        }
        if report.is_accepted() {
            info!("{}: proof accepted", label);
        } else {
            warn!("{}: proof rejected", label);
            all_accepted = false;
        }
    }
    all_accepted
}

fn print_calldata(report: &PipelineReport) -> Result<(), anyhow::Error> {
    let output = &report.proof;
    let calldata = SolidityCalldata::from_proof(&output.proof, &output.public_signals)
        .with_context(|| format!("preparing calldata for {}", report.label))?;
    println!("{}", serde_json::to_string_pretty(&calldata.to_flat_json())?);
    Ok(())
}

async fn verify_saved_proof(
    on_chain: &OnChainConfig,
    proof: &Path,
) -> Result<ExitCode, anyhow::Error> {
    let calldata = SolidityCalldata::from_flat_json(&read_json(proof)?)
        .with_context(|| format!("reading calldata from {}", proof.display()))?;
    let verifier = EthCallVerifier::new(on_chain.rpc_url.clone(), &on_chain.verifier_address)?;
    let verdict = Verdict::from_result(verifier.verify(&calldata).await?, "on-chain");
    match verdict {
        Verdict::Valid => {
            info!("Proof is valid!");
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            warn!("Proof is invalid");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::Info);

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .init();

    info!("Logging initialized with level: {}", log_level);
}

#[tokio::main]
async fn main() -> Result<ExitCode, anyhow::Error> {
    init_logging();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref(), cli.strict)?;

    match cli.command {
        Commands::Encode { inputs, out_dir } => encode(&config, &inputs, out_dir.as_deref()),
        Commands::Prove { prove } => {
            prove.apply(&mut config);
            config.verification_key = None;
            config.on_chain = None;
            run_pipeline(config, &prove.inputs, print_calldata).await
        }
        Commands::ProveVerify { prove, vkey } => {
            prove.apply(&mut config);
            config.on_chain = None;
            if let Some(vkey) = vkey {
                config.verification_key = Some(vkey);
            }
            let vkey = config
                .verification_key
                .get_or_insert_with(|| PathBuf::from("verification_key.json"));
            info!("Verifying against {}", vkey.display());
            run_pipeline(config, &prove.inputs, |_| Ok(())).await
        }
        Commands::VerifyOnchain {
            prove,
            rpc_url,
            verifier,
            proof,
        } => {
            prove.apply(&mut config);
            config.verification_key = None;
            let on_chain = match (rpc_url, verifier, config.on_chain.take()) {
                (Some(rpc_url), Some(verifier_address), _) => OnChainConfig {
                    rpc_url,
                    verifier_address,
                },
                (rpc_url, verifier, Some(configured)) => OnChainConfig {
                    rpc_url: rpc_url.unwrap_or(configured.rpc_url),
                    verifier_address: verifier.unwrap_or(configured.verifier_address),
                },
                _ => anyhow::bail!(
                    "--rpc-url and --verifier are required without an on_chain config"
                ),
            };

            match proof {
                Some(proof) => verify_saved_proof(&on_chain, &proof).await,
                None => {
                    config.on_chain = Some(on_chain);
                    run_pipeline(config, &prove.inputs, |_| Ok(())).await
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "zkinput",
            "--strict",
            "prove",
            "--zkey",
            "keys/final.zkey",
            "--proof-dir",
            "out",
            "a.json",
            "b.json",
        ]);
        let mut config = load_config(cli.config.as_deref(), cli.strict).unwrap();
        let Commands::Prove { prove } = cli.command else {
            panic!("expected prove");
        };
        prove.apply(&mut config);

        assert!(config.strict_truncation);
        assert_eq!(config.proving_key, PathBuf::from("keys/final.zkey"));
        assert_eq!(config.circuit_wasm, PathBuf::from("circuit_js/circuit.wasm"));
        assert_eq!(config.proof_dir, Some(PathBuf::from("out")));
        assert_eq!(prove.inputs.len(), 2);
    }

    #[test]
    fn saved_proof_excludes_inputs() {
        assert!(Cli::try_parse_from([
            "zkinput",
            "verify-onchain",
            "--proof",
            "calldata.json",
            "input.json",
        ])
        .is_err());
    }

    #[test]
    fn labels_come_from_file_stems() {
        assert_eq!(label_for(Path::new("records/alice.json")), "alice");
        assert_eq!(label_for(Path::new("bob")), "bob");
    }

    #[test]
    fn repeated_stems_get_distinct_labels() {
        let paths: Vec<PathBuf> = ["a/rec.json", "b/rec.json", "rec-2.json", "c/rec.json"]
            .iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(unique_labels(&paths), vec!["rec", "rec-2", "rec-2-2", "rec-3"]);
    }

    fn report(label: &str, local: Verdict) -> PipelineReport {
        use zkinput::proof::{Groth16Proof, ProofOutput};

        PipelineReport {
            label: label.to_string(),
            truncated_fields: Vec::new(),
            proof: ProofOutput {
                proof: Groth16Proof {
                    pi_a: vec!["1".into(), "2".into(), "1".into()],
                    pi_b: vec![
                        vec!["3".into(), "4".into()],
                        vec!["5".into(), "6".into()],
                        vec!["1".into(), "0".into()],
                    ],
                    pi_c: vec!["7".into(), "8".into(), "1".into()],
                    protocol: "groth16".into(),
                    curve: "bn128".into(),
                },
                public_signals: vec!["42".into()],
            },
            local,
            on_chain: Verdict::Skipped,
        }
    }

    #[test]
    fn failed_report_does_not_hide_the_rest() {
        let seen = std::cell::RefCell::new(Vec::new());
        let results = vec![
            ("a".to_string(), Ok(report("a", Verdict::Valid))),
            ("b".to_string(), Err(anyhow::anyhow!("prover failed"))),
            ("c".to_string(), Ok(report("c", Verdict::Valid))),
        ];
        let all_accepted = summarize(results, |report| {
            seen.borrow_mut().push(report.label.clone());
            if report.label == "a" {
                anyhow::bail!("cannot print calldata");
            }
            Ok(())
        });

        assert!(!all_accepted);
        assert_eq!(*seen.borrow(), vec!["a", "c"]);
    }

    #[test]
    fn all_accepted_is_success() {
        let results = vec![("a".to_string(), Ok(report("a", Verdict::Valid)))];
        assert!(summarize(results, |_| Ok(())));

        let rejected = Verdict::Invalid {
            reason: "local verification failed".into(),
        };
        let results = vec![("a".to_string(), Ok(report("a", rejected)))];
        assert!(!summarize(results, |_| Ok(())));
    }
}
