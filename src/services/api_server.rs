// src/services/api_server.rs
//! API Server for the Tourist ID issuer
//!
//! Thin HTTP layer over [`CredentialIssuer`] and [`Verifier`]: it only
//! marshals JSON in and out and maps error kinds to status codes. Every
//! request runs under one top-level timeout.
//!
//! Endpoints:
//! - `POST /issue-id` - issue and anchor a credential
//! - `POST /verify-id` - cryptographic + anchor verification
//! - `POST /verify-id/policy` - verification plus trust and validity-window checks
//! - `GET  /issuers/:address/trusted` - registry trust flag
//! - `GET  /health`

use crate::error::{Error, LedgerError};
use crate::models::credential::{CredentialAttributes, IssuedCredential, Timestamp};
use crate::services::credential_issuer::{CredentialIssuer, Issuance};
use crate::services::verifier::{PolicyReport, VerificationReport, Verifier};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ethers_core::types::Address;
use ethers_core::utils::to_checksum;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

/// Request payload for verification. `vc` is accepted as an alias.
#[derive(Deserialize)]
struct VerifyRequest {
    #[serde(alias = "vc")]
    credential: Option<Value>,
}

/// Response for credential issuance.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueResponse {
    #[serde(flatten)]
    issuance: Issuance,
    #[serde(skip_serializing_if = "Option::is_none")]
    registry: Option<String>,
}

#[derive(Serialize)]
struct TrustResponse {
    issuer: String,
    trusted: bool,
}

/// Error body: `{ "error": message, "kind": ErrorKind }`.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::Signature(_) => StatusCode::BAD_REQUEST,
            Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Ledger(LedgerError::AlreadyAnchored { .. }) => StatusCode::CONFLICT,
            Error::Ledger(LedgerError::Rejected(_)) => StatusCode::BAD_GATEWAY,
            Error::Ledger(LedgerError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Ledger(LedgerError::Timeout(_)) | Error::RequestTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            warn!("request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string(), "kind": self.0.kind() }))).into_response()
    }
}

/// Shared state handed to every handler.
pub struct ApiServer {
    credential_issuer: CredentialIssuer,
    verifier: Verifier,
    registry_address: Option<Address>,
    backend: &'static str,
    request_timeout: Duration,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `credential_issuer` - Service for credential issuance
    /// * `verifier` - Service for credential verification
    /// * `registry_address` - Registry contract, echoed in responses when on-chain
    /// * `backend` - Ledger backend label for `/health`
    /// * `request_timeout` - Deadline applied to each request
    pub fn new(
        credential_issuer: CredentialIssuer,
        verifier: Verifier,
        registry_address: Option<Address>,
        backend: &'static str,
        request_timeout: Duration,
    ) -> Self {
        ApiServer {
            credential_issuer,
            verifier,
            registry_address,
            backend,
            request_timeout,
        }
    }

    /// Builds the router with all routes and permissive CORS, as the mobile
    /// client calls the issuer cross-origin.
    pub fn router(self) -> Router {
        Router::new()
            .route("/issue-id", post(Self::issue_handler))
            .route("/verify-id", post(Self::verify_handler))
            .route("/verify-id/policy", post(Self::verify_policy_handler))
            .route("/issuers/:address/trusted", get(Self::trust_handler))
            .route("/health", get(Self::health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::new(self))
    }

    /// Binds `addr` and serves until the process is stopped.
    pub async fn run(self, addr: SocketAddr) -> std::io::Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("issuer service listening on http://{}", addr);
        axum::serve(listener, app).await
    }

    async fn bounded<T>(&self, work: impl Future<Output = Result<T, Error>>) -> Result<T, ApiError> {
        tokio::time::timeout(self.request_timeout, work)
            .await
            .map_err(|_| Error::RequestTimeout(self.request_timeout))?
            .map_err(ApiError::from)
    }

    fn presented(body: Result<Json<VerifyRequest>, JsonRejection>) -> Result<IssuedCredential, ApiError> {
        let Json(request) = body.map_err(|e| Error::Validation(e.body_text()))?;
        let value = request
            .credential
            .ok_or_else(|| Error::Validation("credential missing".into()))?;
        Ok(IssuedCredential::try_from(value)?)
    }

    /// Reads issuance attributes. An empty body means "all defaults"; the
    /// content type is not checked.
    fn attributes(body: &[u8]) -> Result<CredentialAttributes, Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(CredentialAttributes::default());
        }
        serde_json::from_slice(body).map_err(|e| Error::Validation(format!("invalid attributes: {}", e)))
    }

    /// Issues a Tourist ID.
    ///
    /// # Endpoint
    /// POST /issue-id
    ///
    /// # Responses
    /// - 200 OK: `{credential, anchorDigest, ledgerRef, registry?}`
    /// - 400 Bad Request: invalid attributes
    /// - 409 / 502 / 503 / 504: ledger refused, unreachable or slow
    async fn issue_handler(
        State(state): State<Arc<ApiServer>>,
        body: Bytes,
    ) -> Result<Json<IssueResponse>, ApiError> {
        let attrs = Self::attributes(&body)?;
        let issuance = state.bounded(state.credential_issuer.issue(attrs)).await?;
        Ok(Json(IssueResponse {
            issuance,
            registry: state.registry_address.map(|a| to_checksum(&a, None)),
        }))
    }

    /// Verifies a presented credential.
    ///
    /// # Endpoint
    /// POST /verify-id
    ///
    /// # Responses
    /// - 200 OK: `{ok, signerIdentity, anchorIdentity, anchorDigest}`, also when `ok` is false
    /// - 400 Bad Request: missing signature, malformed credential or signature
    async fn verify_handler(
        State(state): State<Arc<ApiServer>>,
        body: Result<Json<VerifyRequest>, JsonRejection>,
    ) -> Result<Json<VerificationReport>, ApiError> {
        let credential = Self::presented(body)?;
        let report = state.bounded(state.verifier.verify(&credential)).await?;
        Ok(Json(report))
    }

    async fn verify_policy_handler(
        State(state): State<Arc<ApiServer>>,
        body: Result<Json<VerifyRequest>, JsonRejection>,
    ) -> Result<Json<PolicyReport>, ApiError> {
        let credential = Self::presented(body)?;
        let report = state
            .bounded(state.verifier.evaluate_policy(&credential, Timestamp::now()))
            .await?;
        Ok(Json(report))
    }

    async fn trust_handler(
        State(state): State<Arc<ApiServer>>,
        Path(address): Path<String>,
    ) -> Result<Json<TrustResponse>, ApiError> {
        let issuer: Address = address
            .parse()
            .map_err(|_| Error::Validation(format!("invalid issuer address {:?}", address)))?;
        let trusted = state.bounded(state.verifier.issuer_trusted(issuer)).await?;
        Ok(Json(TrustResponse {
            issuer: to_checksum(&issuer, None),
            trusted,
        }))
    }

    async fn health_handler(State(state): State<Arc<ApiServer>>) -> impl IntoResponse {
        Json(json!({
            "status": "ok",
            "issuer": to_checksum(&state.credential_issuer.issuer_address(), None),
            "registry": state.registry_address.map(|a| to_checksum(&a, None)),
            "backend": state.backend,
        }))
    }
}
