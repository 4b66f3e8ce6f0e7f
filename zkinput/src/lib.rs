//! # zkinput - circuit input encoding and proof orchestration
//!
//! A Rust library that prepares JSON input records for a circom circuit and
//! drives the Groth16 proving and verification around it. The circuit, the
//! prover and the on-chain verifier are external; this crate owns the part
//! where bugs silently corrupt every downstream proof: turning strings, hex,
//! dates and byte buffers into byte arrays of exactly the width each circuit
//! signal expects.
//!
//! ## Encoding
//!
//! ```rust
//! use serde_json::json;
//! use zkinput::codec::FixedWidthCodec;
//!
//! let raw = json!({
//!     "user": "alice",
//!     "game": "chess",
//!     "character": "knight",
//!     "ability": "fork",
//!     "place": "e4",
//!     "place2": "f7",
//!     "uploader": "0x3D4206092FEF5AdDdb20B1f2392D2a2BB3FBe894",
//!     "timestamp": "2024-01-01T00:00:00Z",
//!     "hash_inputdata": [1, 2, 3],
//! });
//!
//! let record = FixedWidthCodec::default().encode_record(&raw)?;
//! assert_eq!(record.field("user").unwrap().bytes, b"alice\0\0\0".to_vec());
//! assert_eq!(record.field("hash_inputdata").unwrap().bytes.len(), 32);
//! # Ok::<(), zkinput::error::CodecError>(())
//! ```
//!
//! Values longer than their field are truncated and logged. Use
//! [`TruncationPolicy::Strict`](codec::TruncationPolicy::Strict) to reject
//! them instead.
//!
//! ## Proving and verifying
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use zkinput::pipeline::{Pipeline, PipelineConfig};
//!
//! # async fn run(raw: serde_json::Value) -> Result<(), anyhow::Error> {
//! let config = PipelineConfig {
//!     circuit_wasm: PathBuf::from("circuit_js/circuit.wasm"),
//!     proving_key: PathBuf::from("circuit_final.zkey"),
//!     verification_key: Some(PathBuf::from("verification_key.json")),
//!     ..PipelineConfig::default()
//! };
//!
//! let pipeline = Pipeline::from_config(config)?;
//! let report = pipeline.run("record-1", &raw).await?;
//! assert!(report.is_accepted());
//! # Ok(())
//! # }
//! ```
//!
//! Proofs come from `snarkjs groth16 fullprove`. Any other prover can be
//! plugged in by implementing [`prover::ProofGenerator`]; likewise
//! [`onchain::OnChainVerifier`] for the remote verifier.

pub mod codec;
pub mod error;
pub mod fields;
pub mod onchain;
pub mod pipeline;
pub mod proof;
pub mod prover;
pub mod response;
pub mod utils;
pub mod verifier;
