use crate::proof::ProofOutput;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Skipped,
    Valid,
    Invalid { reason: String },
}

impl Verdict {
    pub fn from_result(valid: bool, verifier: &str) -> Self {
        if valid {
            Verdict::Valid
        } else {
            Verdict::Invalid {
                reason: format!("{verifier} verification failed"),
            }
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Verdict::Invalid { .. })
    }
}

/// Outcome of one encode, prove and verify run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineReport {
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub truncated_fields: Vec<String>,
    pub proof: ProofOutput,
    pub local: Verdict,
    pub on_chain: Verdict,
}

impl PipelineReport {
    /// No verifier that ran rejected the proof.
    pub fn is_accepted(&self) -> bool {
        !self.local.is_invalid() && !self.on_chain.is_invalid()
    }
}
