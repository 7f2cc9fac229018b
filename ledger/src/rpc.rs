//! JSON-RPC client for the registry node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::time::sleep;

use ticket_registry_core::ledger::check_batch;
use ticket_registry_core::{
    CommitmentHash, EventDetails, EventId, LedgerClient, LedgerError, LedgerRecord, LedgerStats,
    OwnerAddress, ProgramAttestation, RejectionReason, SigningKey, TxHash,
};

// Business-rule error codes returned by the registry node.
const ERR_UNKNOWN_COMMITMENT: i64 = -32001;
const ERR_DUPLICATE_COMMITMENT: i64 = -32002;
const ERR_ALREADY_USED: i64 = -32003;
const ERR_NOT_TICKET_OWNER: i64 = -32004;
const ERR_UNKNOWN_EVENT: i64 = -32005;
const ERR_EVENT_INACTIVE: i64 = -32006;
// Standard JSON-RPC codes.
const ERR_INVALID_PARAMS: i64 = -32602;
const ERR_INTERNAL: i64 = -32603;

/// How long and how often to poll a submitted write for finality.
#[derive(Debug, Clone)]
pub struct FinalityPolicy {
    /// Receipt polls before giving up.
    pub attempts: u32,
    /// Delay between polls.
    pub interval: Duration,
}

impl Default for FinalityPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_millis(500),
        }
    }
}

/// `LedgerClient` over JSON-RPC 2.0.
///
/// Holds the system's write credential for registration, use-marking, and
/// event creation; ownership transfers are signed by the presented owner
/// credential instead, never by the system's own key.
#[derive(Debug)]
pub struct JsonRpcLedgerClient {
    http: reqwest::Client,
    endpoint: String,
    program_address: String,
    write_key: SigningKey,
    finality: FinalityPolicy,
    next_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    /// Creates a client for the node at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error if the HTTP client cannot be
    /// constructed (e.g. no TLS backend).
    pub fn new(
        endpoint: impl Into<String>,
        program_address: impl Into<String>,
        write_key: SigningKey,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            program_address: program_address.into(),
            write_key,
            finality: FinalityPolicy::default(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Overrides the finality polling policy.
    #[must_use]
    pub fn with_finality(mut self, finality: FinalityPolicy) -> Self {
        self.finality = finality;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| LedgerError::Transient(format!("rpc send failed: {err}")))?;
        if !response.status().is_success() {
            return Err(LedgerError::Transient(format!(
                "rpc http status {}",
                response.status()
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| LedgerError::Transient(format!("rpc decode failed: {err}")))?;
        if let Some(error) = body.error {
            tracing::debug!(method, code = error.code, "rpc error response");
            return Err(classify_rpc_error(error.code, &error.message));
        }
        body.result
            .ok_or_else(|| LedgerError::Transient("rpc response had no result".to_string()))
    }

    /// Submits a write, then polls its receipt until the node reports
    /// finality.
    async fn submit_and_await(&self, method: &str, params: Value) -> Result<TxHash, LedgerError> {
        let submitted: TxSubmission = decode(self.call(method, params).await?)?;
        self.await_finality(TxHash::new(submitted.tx_hash)).await
    }

    async fn await_finality(&self, tx_hash: TxHash) -> Result<TxHash, LedgerError> {
        for _ in 0..self.finality.attempts {
            let receipt: TxReceipt = decode(
                self.call("registry_getTransaction", json!({ "txHash": tx_hash.as_str() }))
                    .await?,
            )?;
            match receipt.status {
                TxStatus::Final => return Ok(tx_hash),
                TxStatus::Failed => {
                    let error = receipt.error.ok_or_else(|| {
                        LedgerError::Rejected(RejectionReason::Other(
                            "transaction failed without a reason".to_string(),
                        ))
                    })?;
                    return Err(classify_rpc_error(error.code, &error.message));
                }
                TxStatus::Pending => sleep(self.finality.interval).await,
            }
        }
        // Ambiguous: the write may still land. Callers must re-read ledger
        // state before considering a resubmit.
        Err(LedgerError::Transient(format!(
            "transaction {tx_hash} did not reach finality within the polling window"
        )))
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn register_batch(
        &self,
        commitments: &[CommitmentHash],
        owners: &[OwnerAddress],
        event_id: EventId,
    ) -> Result<TxHash, LedgerError> {
        check_batch(commitments, owners)?;
        let params = json!({
            "commitments": commitments.iter().map(CommitmentHash::to_hex).collect::<Vec<_>>(),
            "owners": owners.iter().map(OwnerAddress::as_str).collect::<Vec<_>>(),
            "eventId": event_id.value(),
            "signerKey": self.write_key.reveal(),
        });
        self.submit_and_await("registry_registerBatch", params).await
    }

    async fn read_by_commitment(
        &self,
        commitment: &CommitmentHash,
    ) -> Result<LedgerRecord, LedgerError> {
        let result = self
            .call(
                "registry_verifyTicket",
                json!({ "commitment": commitment.to_hex() }),
            )
            .await?;
        let record: TicketRecordDto = decode(result)?;
        Ok(record.into())
    }

    async fn mark_used(&self, commitment: &CommitmentHash) -> Result<TxHash, LedgerError> {
        let params = json!({
            "commitment": commitment.to_hex(),
            "signerKey": self.write_key.reveal(),
        });
        self.submit_and_await("registry_markUsed", params).await
    }

    async fn transfer_owner(
        &self,
        commitment: &CommitmentHash,
        new_owner: &OwnerAddress,
        signer: &SigningKey,
    ) -> Result<TxHash, LedgerError> {
        // Signed by the presented owner credential, not the system key; the
        // node rejects credentials that do not match the recorded owner.
        let params = json!({
            "commitment": commitment.to_hex(),
            "newOwner": new_owner.as_str(),
            "signerKey": signer.reveal(),
        });
        self.submit_and_await("registry_transferTicket", params).await
    }

    async fn get_event(&self, event_id: EventId) -> Result<EventDetails, LedgerError> {
        let result = self
            .call("registry_getEvent", json!({ "eventId": event_id.value() }))
            .await?;
        decode(result)
    }

    async fn get_stats(&self) -> Result<LedgerStats, LedgerError> {
        let stats: StatsDto = decode(self.call("registry_getStats", json!({})).await?)?;
        Ok(LedgerStats {
            total_events: stats.total_events,
            total_tickets: stats.total_tickets,
        })
    }

    async fn create_event(
        &self,
        name: &str,
        date: u64,
        location: &str,
    ) -> Result<(EventId, TxHash), LedgerError> {
        if name.is_empty() || location.is_empty() {
            return Err(LedgerError::InvalidRequest(
                "event name and location are required".to_string(),
            ));
        }
        let params = json!({
            "name": name,
            "date": date,
            "location": location,
            "signerKey": self.write_key.reveal(),
        });
        let created: EventCreatedDto = decode(self.call("registry_createEvent", params).await?)?;
        let tx_hash = self.await_finality(TxHash::new(created.tx_hash)).await?;
        Ok((EventId::new(created.event_id), tx_hash))
    }

    async fn attestation(&self) -> Result<ProgramAttestation, LedgerError> {
        let result = self
            .call(
                "registry_attest",
                json!({ "programAddress": self.program_address }),
            )
            .await?;
        let dto: AttestationDto = decode(result)?;
        Ok(ProgramAttestation {
            program_address: dto.program_address,
            code_exists: dto.code_exists,
            code_length: dto.code_length,
            block_height: dto.block_height,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxSubmission {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TxStatus {
    Pending,
    Final,
    Failed,
}

#[derive(Debug, Deserialize)]
struct TxReceipt {
    status: TxStatus,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketRecordDto {
    owner: String,
    used: bool,
    event_id: u64,
    timestamp: u64,
    is_valid: bool,
}

impl From<TicketRecordDto> for LedgerRecord {
    fn from(dto: TicketRecordDto) -> Self {
        Self {
            owner: OwnerAddress::new(dto.owner),
            used: dto.used,
            event_id: EventId::new(dto.event_id),
            registered_at: dto.timestamp,
            is_valid: dto.is_valid,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsDto {
    total_events: u64,
    total_tickets: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventCreatedDto {
    event_id: u64,
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationDto {
    program_address: String,
    code_exists: bool,
    code_length: u64,
    block_height: u64,
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, LedgerError> {
    serde_json::from_value(value)
        .map_err(|err| LedgerError::Transient(format!("malformed rpc result: {err}")))
}

fn classify_rpc_error(code: i64, message: &str) -> LedgerError {
    match code {
        ERR_UNKNOWN_COMMITMENT => LedgerError::Rejected(RejectionReason::UnknownCommitment),
        ERR_DUPLICATE_COMMITMENT => LedgerError::Rejected(RejectionReason::DuplicateCommitment),
        ERR_ALREADY_USED => LedgerError::Rejected(RejectionReason::AlreadyUsed),
        ERR_NOT_TICKET_OWNER => LedgerError::Rejected(RejectionReason::NotTicketOwner),
        ERR_UNKNOWN_EVENT => LedgerError::Rejected(RejectionReason::UnknownEvent),
        ERR_EVENT_INACTIVE => LedgerError::Rejected(RejectionReason::EventInactive),
        ERR_INVALID_PARAMS => LedgerError::InvalidRequest(message.to_string()),
        ERR_INTERNAL => LedgerError::Transient(format!("node internal error: {message}")),
        _ => LedgerError::Rejected(RejectionReason::Other(message.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_map_to_typed_reasons() {
        assert_eq!(
            classify_rpc_error(ERR_ALREADY_USED, "used"),
            LedgerError::Rejected(RejectionReason::AlreadyUsed)
        );
        assert_eq!(
            classify_rpc_error(ERR_NOT_TICKET_OWNER, "no"),
            LedgerError::Rejected(RejectionReason::NotTicketOwner)
        );
        assert_eq!(
            classify_rpc_error(ERR_DUPLICATE_COMMITMENT, "dup"),
            LedgerError::Rejected(RejectionReason::DuplicateCommitment)
        );
        assert!(matches!(
            classify_rpc_error(ERR_INVALID_PARAMS, "bad params"),
            LedgerError::InvalidRequest(_)
        ));
        assert!(classify_rpc_error(ERR_INTERNAL, "oops").is_transient());
        assert_eq!(
            classify_rpc_error(-1, "custom refusal"),
            LedgerError::Rejected(RejectionReason::Other("custom refusal".to_string()))
        );
    }

    #[test]
    fn ticket_record_dto_decodes_camel_case_wire_form() {
        let record: TicketRecordDto = serde_json::from_value(json!({
            "owner": "0xabc",
            "used": false,
            "eventId": 3,
            "timestamp": 1_900_000_000u64,
            "isValid": true,
        }))
        .unwrap();
        let record = LedgerRecord::from(record);
        assert_eq!(record.owner, OwnerAddress::new("0xabc"));
        assert_eq!(record.event_id, EventId::new(3));
        assert!(record.is_valid);
        assert!(record.registered_on_chain());
    }

    #[test]
    fn receipt_statuses_decode() {
        let receipt: TxReceipt =
            serde_json::from_value(json!({ "status": "final", "error": null })).unwrap();
        assert!(matches!(receipt.status, TxStatus::Final));

        let receipt: TxReceipt = serde_json::from_value(json!({
            "status": "failed",
            "error": { "code": ERR_ALREADY_USED, "message": "used" },
        }))
        .unwrap();
        assert!(matches!(receipt.status, TxStatus::Failed));
        assert_eq!(receipt.error.unwrap().code, ERR_ALREADY_USED);
    }

    #[tokio::test]
    async fn batch_preconditions_fail_before_any_network_io() {
        // Unroutable endpoint: if the precheck did not short-circuit, this
        // test would hang or return a transport error instead.
        let client = JsonRpcLedgerClient::new(
            "http://127.0.0.1:1",
            "0xprogram",
            SigningKey::new("write-key"),
            Duration::from_millis(50),
        )
        .unwrap();

        let err = client
            .register_batch(&[], &[], EventId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));

        let err = client
            .register_batch(
                &[CommitmentHash::from_bytes([1; 32])],
                &[],
                EventId::new(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
    }
}
