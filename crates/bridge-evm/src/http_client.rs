// Path: crates/bridge-evm/src/http_client.rs
//! A thin HTTP reference implementation of [`EvmClient`], grounded in the same
//! teacher pattern as `seda-bridge-upstream::HttpSedaClient`: a plain
//! `reqwest::Client` with a hand-rolled retry loop over 429/5xx responses. The
//! destination chain's actual ABI encoding and JSON-RPC wire format are out of
//! scope — this client assumes a JSON-RPC-shaped facade over the
//! prover contract so the workspace is runnable end-to-end.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use crate::client::{BatchCalldata, EvmClient, EvmError, PostBatchReceipt};
use crate::signature::SignatureBundle;

const HTTP_RETRIES: u32 = 5;
const BASE_BACKOFF_MS: u64 = 100;

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(1u64 << attempt).min(5_000))
}

/// A thin `reqwest`-backed client against a JSON-RPC-shaped prover facade for
/// one destination chain.
#[derive(Clone)]
pub struct HttpEvmClient {
    base_url: String,
    client: Client,
}

impl HttpEvmClient {
    /// Builds a client against `base_url` (the chain's JSON-RPC facade endpoint).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: Client::new() }
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: DeserializeOwned>(&self, path: &str, body: &Req) -> Result<Resp, EvmError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let mut attempt = 0;
        loop {
            let resp = self.client.post(&url).json(body).send().await;
            let resp = match resp {
                Ok(r) => r,
                Err(err) => {
                    if attempt < HTTP_RETRIES {
                        debug!(path, attempt, error = %err, "evm http send error; retrying");
                        sleep(retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(EvmError::Rpc(format!("request to {path} failed after retries: {err}")));
                }
            };

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if attempt < HTTP_RETRIES {
                    debug!(path, attempt, %status, "evm http {}; retrying", status);
                    sleep(retry_delay(attempt)).await;
                    attempt += 1;
                    continue;
                }
                return Err(EvmError::Rpc(format!("request to {path} returned {status} after retries")));
            }
            if !status.is_success() {
                let body_text = resp.text().await.unwrap_or_default();
                return Err(EvmError::Rpc(format!("request to {path} returned {status}: {body_text}")));
            }
            return resp.json::<Resp>().await.map_err(|err| EvmError::Decode(format!("failed to decode response from {path}: {err}")));
        }
    }
}

#[derive(Serialize)]
struct SignatureBundleWire<'a> {
    proof: &'a [[u8; 32]],
    eth_address: [u8; 20],
    voting_power_bp: u32,
    signature: [u8; 65],
}

fn to_wire(bundles: &[SignatureBundle]) -> Vec<SignatureBundleWire<'_>> {
    bundles
        .iter()
        .map(|b| SignatureBundleWire { proof: &b.proof, eth_address: b.eth_address, voting_power_bp: b.voting_power_bp, signature: b.signature })
        .collect()
}

#[async_trait]
impl EvmClient for HttpEvmClient {
    async fn get_seda_prover(&self) -> Result<String, EvmError> {
        #[derive(Deserialize)]
        struct Resp {
            prover: String,
        }
        self.post_json::<_, Resp>("core/seda-prover", &()).await.map(|r| r.prover)
    }

    async fn get_last_batch_height(&self) -> Result<u64, EvmError> {
        #[derive(Deserialize)]
        struct Resp {
            height: u64,
        }
        self.post_json::<_, Resp>("prover/last-batch-height", &()).await.map(|r| r.height)
    }

    async fn is_batch_pushed(&self, batch_number: u64) -> Result<bool, EvmError> {
        #[derive(Serialize)]
        struct Req {
            batch_number: u64,
        }
        #[derive(Deserialize)]
        struct Resp {
            pushed: bool,
        }
        self.post_json::<_, Resp>("prover/is-batch-pushed", &Req { batch_number }).await.map(|r| r.pushed)
    }

    async fn estimate_gas(&self, batch: &BatchCalldata, signatures: &[SignatureBundle]) -> Result<u64, EvmError> {
        #[derive(Serialize)]
        struct Req<'a> {
            batch_number: u64,
            batch_id: [u8; 32],
            signatures: Vec<SignatureBundleWire<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            gas: u64,
        }
        let req = Req { batch_number: batch.batch_number, batch_id: batch.batch_id, signatures: to_wire(signatures) };
        self.post_json::<_, Resp>("prover/estimate-gas", &req).await.map(|r| r.gas)
    }

    async fn post_batch(&self, batch: &BatchCalldata, signatures: &[SignatureBundle], gas_limit: u64) -> Result<PostBatchReceipt, EvmError> {
        #[derive(Serialize)]
        struct Req<'a> {
            batch_number: u64,
            batch_id: [u8; 32],
            data_result_root: [u8; 32],
            validator_root: [u8; 32],
            signatures: Vec<SignatureBundleWire<'a>>,
            gas_limit: u64,
        }
        #[derive(Deserialize)]
        struct Resp {
            tx_hash: String,
            block_number: u64,
            gas_used: u64,
        }
        let req = Req {
            batch_number: batch.batch_number,
            batch_id: batch.batch_id,
            data_result_root: batch.data_result_root,
            validator_root: batch.validator_root,
            signatures: to_wire(signatures),
            gas_limit,
        };
        self.post_json::<_, Resp>("prover/post-batch", &req)
            .await
            .map(|r| PostBatchReceipt { tx_hash: r.tx_hash, block_number: r.block_number, gas_used: r.gas_used })
    }

    async fn check_health(&self) -> bool {
        self.get_last_batch_height().await.is_ok()
    }
}
