// Path: crates/bridge-upstream/src/http_client.rs
//! A thin HTTP reference implementation of [`SedaClient`], grounded in the
//! teacher's IBC relayer gateway (`ioi_relayer::gateway::Gateway`): a plain
//! `reqwest::Client` plus a hand-rolled backoff loop over 429/5xx responses.
//! The SEDA wire protocol itself is out of scope — this client
//! assumes a JSON-RPC-shaped facade and exists so the workspace compiles and
//! runs end-to-end against *some* upstream, not as a protocol implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use seda_bridge_types::error::SequenceError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

use crate::{
    AwaitOptions, BatchAssignment, DataResultOutcome, PostDataRequestInput, PostDataRequestOutput,
    QueryBatchOutput, SedaClient, SedaQueryError, SedaSubmitError,
};

const HTTP_RETRIES: u32 = 5;
const BASE_BACKOFF_MS: u64 = 100;

fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(1u64 << attempt).min(5_000))
}

/// A thin `reqwest`-backed client against a SEDA-compatible JSON-RPC facade.
#[derive(Clone)]
pub struct HttpSedaClient {
    base_url: String,
    client: Client,
}

impl HttpSedaClient {
    /// Builds a client against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let mut attempt = 0;
        loop {
            let resp = self.client.post(&url).json(body).send().await;
            let resp = match resp {
                Ok(r) => r,
                Err(err) => {
                    if attempt < HTTP_RETRIES {
                        debug!(path, attempt, error = %err, "seda http send error; retrying");
                        sleep(retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(format!("request to {path} failed after retries: {err}"));
                }
            };

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if attempt < HTTP_RETRIES {
                    debug!(path, attempt, %status, "seda http {}; retrying", status);
                    sleep(retry_delay(attempt)).await;
                    attempt += 1;
                    continue;
                }
                return Err(format!("request to {path} returned {status} after retries"));
            }
            if status == StatusCode::NOT_FOUND {
                return Err("not-found".to_string());
            }
            if !status.is_success() {
                let body_text = resp.text().await.unwrap_or_default();
                return Err(format!("request to {path} returned {status}: {body_text}"));
            }
            return resp
                .json::<Resp>()
                .await
                .map_err(|err| format!("failed to decode response from {path}: {err}"));
        }
    }
}

#[derive(Serialize)]
struct PostDataRequestBody<'a> {
    memo: &'a str,
    sequence: u64,
}

#[derive(Deserialize)]
struct PostDataRequestResponse {
    dr_id: String,
    block_height: u64,
    tx_hash: String,
}

#[async_trait]
impl SedaClient for HttpSedaClient {
    async fn post_data_request(
        &self,
        input: PostDataRequestInput,
        sequence: u64,
    ) -> Result<PostDataRequestOutput, SedaSubmitError> {
        let body = PostDataRequestBody { memo: &input.memo, sequence };
        match self.post_json::<_, PostDataRequestResponse>("dr/post", &body).await {
            Ok(resp) => Ok(PostDataRequestOutput {
                dr_id: resp.dr_id,
                block_height: resp.block_height,
                tx_hash: resp.tx_hash,
            }),
            Err(msg) if msg.contains("sequence mismatch") => {
                let expected = parse_expected_sequence(&msg).unwrap_or(sequence);
                Err(SedaSubmitError::SequenceMismatch { expected })
            }
            Err(msg) if msg.contains("already exists") => Err(SedaSubmitError::AlreadyExists(PostDataRequestOutput {
                dr_id: String::new(),
                block_height: 0,
                tx_hash: String::new(),
            })),
            Err(msg) => Err(SedaSubmitError::Rpc(msg)),
        }
    }

    async fn await_data_result(
        &self,
        dr_id: &str,
        block_height: u64,
        opts: AwaitOptions,
    ) -> Result<DataResultOutcome, SedaQueryError> {
        #[derive(Serialize)]
        struct Req<'a> {
            dr_id: &'a str,
            block_height: u64,
        }
        #[derive(Deserialize)]
        struct Resp {
            dr_id: String,
            exit_code: u32,
            result: Vec<u8>,
            block_height: u64,
            gas_used: u64,
            consensus: bool,
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(opts.timeout_secs);
        loop {
            let outcome = self
                .post_json::<_, Resp>("dr/result", &Req { dr_id, block_height })
                .await;
            match outcome {
                Ok(resp) => {
                    return Ok(DataResultOutcome {
                        dr_id: resp.dr_id,
                        exit_code: resp.exit_code,
                        result: resp.result,
                        block_height: resp.block_height,
                        gas_used: resp.gas_used,
                        consensus: resp.consensus,
                    })
                }
                Err(msg) if msg == "not-found" => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(SedaQueryError::NotFound);
                    }
                    sleep(Duration::from_secs(opts.poll_interval_secs)).await;
                }
                Err(msg) => return Err(SedaQueryError::Rpc(msg)),
            }
        }
    }

    async fn query_account_sequence(&self, address: &str) -> Result<u64, SequenceError> {
        #[derive(Serialize)]
        struct Req<'a> {
            address: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            sequence: u64,
        }
        self.post_json::<_, Resp>("account/sequence", &Req { address })
            .await
            .map(|resp| resp.sequence)
            .map_err(SequenceError::QueryFailed)
    }

    async fn query_data_result(&self, dr_id: &str, block_height: u64) -> Result<Option<BatchAssignment>, SedaQueryError> {
        #[derive(Serialize)]
        struct Req<'a> {
            dr_id: &'a str,
            block_height: u64,
        }
        #[derive(Deserialize)]
        struct Resp {
            batch_number: Option<u64>,
        }
        match self.post_json::<_, Resp>("dr/batch-assignment", &Req { dr_id, block_height }).await {
            Ok(Resp { batch_number: Some(n) }) => Ok(Some(BatchAssignment { batch_number: n })),
            Ok(Resp { batch_number: None }) => Ok(None),
            Err(msg) if msg == "not-found" => Ok(None),
            Err(msg) => Err(SedaQueryError::Rpc(msg)),
        }
    }

    async fn query_batch(&self, batch_number: u64, latest_signed: bool) -> Result<Option<QueryBatchOutput>, SedaQueryError> {
        #[derive(Serialize)]
        struct Req {
            batch_number: u64,
            latest_signed: bool,
        }
        match self
            .post_json::<_, seda_bridge_types::Batch>("batch/query", &Req { batch_number, latest_signed })
            .await
        {
            Ok(batch) => Ok(Some(QueryBatchOutput { batch })),
            Err(msg) if msg == "not-found" => Ok(None),
            Err(msg) => Err(SedaQueryError::Rpc(msg)),
        }
    }
}

fn parse_expected_sequence(msg: &str) -> Option<u64> {
    // Expects the shape "account sequence mismatch, expected 10, got 7"
    let after = msg.split("expected ").nth(1)?;
    let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_expected_sequence_extracts_literal_message_shape() {
        let msg = "account sequence mismatch, expected 10, got 7";
        assert_eq!(parse_expected_sequence(msg), Some(10));
    }

    #[test]
    fn parse_expected_sequence_returns_none_on_unrelated_message() {
        assert_eq!(parse_expected_sequence("some other error"), None);
    }
}
