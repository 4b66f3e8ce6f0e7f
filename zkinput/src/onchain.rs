use crate::{
    error::{CalldataError, VerifierError},
    proof::SolidityCalldata,
    utils::{strip_0x, to_word},
};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tiny_keccak::{Hasher, Keccak};
use url::Url;

/// A deployed Groth16 verifier contract.
///
/// `Ok(false)` means the contract rejected the proof. Transport and RPC
/// failures are errors.
#[async_trait]
pub trait OnChainVerifier: Send + Sync {
    async fn verify(&self, calldata: &SolidityCalldata) -> Result<bool, VerifierError>;
}

#[async_trait]
impl<T: OnChainVerifier + ?Sized> OnChainVerifier for Arc<T> {
    async fn verify(&self, calldata: &SolidityCalldata) -> Result<bool, VerifierError> {
        (**self).verify(calldata).await
    }
}

/// Calls `verifyProof` through `eth_call` on a JSON-RPC endpoint.
pub struct EthCallVerifier {
    client: Client,
    rpc_url: Url,
    contract: [u8; 20],
}

impl EthCallVerifier {
    pub fn new(rpc_url: Url, verifier_address: &str) -> Result<Self, CalldataError> {
        Ok(Self {
            client: Client::new(),
            rpc_url,
            contract: parse_address(verifier_address)?,
        })
    }

    pub fn contract_address(&self) -> String {
        format!("0x{}", hex::encode(self.contract))
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[async_trait]
impl OnChainVerifier for EthCallVerifier {
    async fn verify(&self, calldata: &SolidityCalldata) -> Result<bool, VerifierError> {
        let data = format!("0x{}", hex::encode(encode_verify_call(calldata)));
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": self.contract_address(), "data": data }, "latest"],
        });

        debug!(
            "Calling verifyProof on {} via {}",
            self.contract_address(),
            self.rpc_url
        );
        let start = Instant::now();
        let response: RpcResponse = self
            .client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!("Received RPC response in {:?}", start.elapsed());

        if let Some(error) = response.error {
            return Err(VerifierError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| VerifierError::MalformedResponse("missing result".to_string()))?;
        let valid = decode_bool_result(&result)?;
        info!("On-chain verification result: {}", valid);
        Ok(valid)
    }
}

/// Parses a `0x`-prefixed 20-byte address.
pub fn parse_address(address: &str) -> Result<[u8; 20], CalldataError> {
    let invalid = || CalldataError::InvalidAddress(address.to_string());
    let digits = address.trim().strip_prefix("0x").ok_or_else(invalid)?;
    if digits.len() != 40 {
        return Err(invalid());
    }
    let mut bytes = [0u8; 20];
    hex::decode_to_slice(digits, &mut bytes).map_err(|_| invalid())?;
    Ok(bytes)
}

/// Selector of `verifyProof(uint256[2],uint256[2][2],uint256[2],uint256[N])`,
/// the entry point of snarkjs-exported Solidity verifiers.
pub fn verify_proof_selector(num_inputs: usize) -> [u8; 4] {
    let signature =
        format!("verifyProof(uint256[2],uint256[2][2],uint256[2],uint256[{num_inputs}])");
    let mut hash = [0u8; 32];
    let mut keccak = Keccak::v256();
    keccak.update(signature.as_bytes());
    keccak.finalize(&mut hash);
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// ABI call data. All arguments are static arrays, so the encoding is the
/// selector followed by one 32-byte word per element.
pub fn encode_verify_call(calldata: &SolidityCalldata) -> Vec<u8> {
    let mut data = verify_proof_selector(calldata.inputs.len()).to_vec();
    for word in calldata.words() {
        data.extend_from_slice(&to_word(word));
    }
    data
}

pub fn decode_bool_result(result: &str) -> Result<bool, VerifierError> {
    let bytes = hex::decode(strip_0x(result))
        .map_err(|e| VerifierError::MalformedResponse(format!("{result:?}: {e}")))?;
    if bytes.len() != 32 {
        return Err(VerifierError::MalformedResponse(format!(
            "expected a 32-byte bool, got {} bytes",
            bytes.len()
        )));
    }
    match (bytes[..31].iter().all(|&b| b == 0), bytes[31]) {
        (true, 0) => Ok(false),
        (true, 1) => Ok(true),
        _ => Err(VerifierError::MalformedResponse(format!(
            "not an ABI bool: {result}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::Groth16Proof;

    #[test]
    fn selectors_match_snarkjs_verifiers() {
        assert_eq!(hex::encode(verify_proof_selector(1)), "43753b4d");
        assert_eq!(hex::encode(verify_proof_selector(2)), "f5c9d69e");
    }

    #[test]
    fn call_data_layout() {
        let proof = Groth16Proof {
            pi_a: vec!["1".into(), "2".into(), "1".into()],
            pi_b: vec![
                vec!["3".into(), "4".into()],
                vec!["5".into(), "6".into()],
                vec!["1".into(), "0".into()],
            ],
            pi_c: vec!["7".into(), "8".into(), "1".into()],
            protocol: "groth16".into(),
            curve: "bn128".into(),
        };
        let calldata = SolidityCalldata::from_proof(&proof, &["258".to_string()]).unwrap();
        let data = encode_verify_call(&calldata);

        assert_eq!(data.len(), 4 + 9 * 32);
        assert_eq!(&data[..4], &verify_proof_selector(1));
        let word = |i: usize| &data[4 + i * 32..4 + (i + 1) * 32];
        assert_eq!(word(0)[31], 1);
        assert_eq!(word(2)[31], 4);
        assert_eq!(word(3)[31], 3);
        assert_eq!(&word(8)[30..], &[1, 2]);
    }

    #[test]
    fn bool_results() {
        let word = |last: &str| format!("0x{}{}", "0".repeat(62), last);
        assert!(decode_bool_result(&word("01")).unwrap());
        assert!(!decode_bool_result(&word("00")).unwrap());
        assert!(decode_bool_result(&word("02")).is_err());
        assert!(decode_bool_result("0x").is_err());
        assert!(decode_bool_result("0xzz").is_err());
    }

    #[test]
    fn addresses() {
        let address = "0x3D4206092FEF5AdDdb20B1f2392D2a2BB3FBe894";
        let bytes = parse_address(address).unwrap();
        assert_eq!(bytes[0], 0x3d);
        assert_eq!(bytes[19], 0x94);
        assert!(parse_address("3D4206092FEF5AdDdb20B1f2392D2a2BB3FBe894").is_err());
        assert!(parse_address("0x3D42").is_err());
        assert!(parse_address("0xZZ4206092FEF5AdDdb20B1f2392D2a2BB3FBe894").is_err());
    }
}
