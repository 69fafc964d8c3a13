//! Token issuance HTTP service
//!
//! A small endpoint that mints room access grants for clients that cannot
//! hold the signing secret themselves (e.g. a browser app). CORS is open:
//! the grant, not the origin, is the security boundary.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::auth::{CredentialIssuer, DEFAULT_TTL, RoomPermissions};
use crate::{Error, Result};

/// Shared state for the token endpoints
pub struct TokenService {
    issuer: CredentialIssuer,
    room_url: String,
}

/// Token request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Room to grant access to
    pub room_name: Option<String>,
    /// Identity of the joining participant
    pub participant_name: Option<String>,
}

/// Successful issuance response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Signed grant token
    pub token: String,
    /// Room server URL the client should connect to
    pub url: String,
    /// Echoed room name
    pub room_name: String,
    /// Echoed participant identity
    pub participant_name: String,
}

impl TokenService {
    /// Create the service
    #[must_use]
    pub const fn new(issuer: CredentialIssuer, room_url: String) -> Self {
        Self { issuer, room_url }
    }

    /// Build the router
    #[must_use]
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/api/token", post(issue_token))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .with_state(self)
    }

    /// Serve until the listener fails
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails
    pub async fn serve(self: Arc<Self>, port: u16) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
        tracing::info!(port, "token service listening");
        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Connection(e.to_string()))
    }
}

async fn issue_token(
    State(service): State<Arc<TokenService>>,
    Json(request): Json<TokenRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let room = request.room_name.unwrap_or_default();
    let participant = request.participant_name.unwrap_or_default();

    if room.trim().is_empty() || participant.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Missing required fields",
                "required": ["roomName", "participantName"],
            })),
        );
    }

    let grant = service.issuer.issue(
        &participant,
        &room,
        RoomPermissions::participant(&room),
        DEFAULT_TTL,
    );

    match grant {
        Ok(grant) => {
            tracing::info!(room, participant, "token issued");
            let response = TokenResponse {
                token: grant.token,
                url: service.room_url.clone(),
                room_name: room,
                participant_name: participant,
            };
            // serialization of a plain struct cannot fail
            let body = serde_json::to_value(&response).unwrap_or_default();
            (StatusCode::OK, Json(body))
        }
        Err(Error::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": message })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "token issuance failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to generate token" })),
            )
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
