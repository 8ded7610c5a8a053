//! HTTP attestation lookup served from an [`AttestationStore`].

use crate::storage::AttestationStore;
use axum::{routing::get, Router};
use std::sync::Arc;

pub fn router(store: AttestationStore) -> Router {
    let state = Arc::new(handlers::AppState { store });

    Router::new()
        .route("/v1/signed_vaa/:chain/:emitter/:sequence", get(handlers::get_signed_vaa))
        .route("/health", get(handlers::health))
        .with_state(state)
}

pub async fn serve(store: AttestationStore, host: &str, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(address = %listener.local_addr()?, "attestation service listening");
    axum::serve(listener, router(store)).await
}

pub mod handlers {
    use crate::storage::AttestationStore;
    use crate::types::Address;
    use crate::vaa::VAA;
    use axum::{
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Json},
    };
    use base64::Engine;
    use serde::Serialize;
    use std::sync::Arc;

    #[derive(Clone)]
    pub struct AppState {
        pub store: AttestationStore,
    }

    #[derive(Serialize)]
    pub struct VAAResponse {
        #[serde(rename = "vaaBytes")]
        pub vaa_bytes: String,
        pub vaa: Option<VAAJson>,
    }

    #[derive(Serialize)]
    pub struct VAAJson {
        pub version: u8,
        #[serde(rename = "guardianSetIndex")]
        pub guardian_set_index: u32,
        pub signatures: Vec<SignatureJson>,
        pub timestamp: u32,
        pub nonce: u32,
        #[serde(rename = "emitterChain")]
        pub emitter_chain: u16,
        #[serde(rename = "emitterAddress")]
        pub emitter_address: String,
        pub sequence: u64,
        #[serde(rename = "consistencyLevel")]
        pub consistency_level: u8,
        pub payload: String,
    }

    #[derive(Serialize)]
    pub struct SignatureJson {
        pub index: u8,
        pub signature: String,
    }

    #[derive(Serialize)]
    pub struct ErrorResponse {
        pub error: ErrorInfo,
    }

    #[derive(Serialize)]
    pub struct ErrorInfo {
        pub code: String,
        pub message: String,
    }

    impl From<VAA> for VAAJson {
        fn from(vaa: VAA) -> Self {
            Self {
                version: vaa.version,
                guardian_set_index: vaa.guardian_set_index,
                signatures: vaa.signatures.iter().map(|s| SignatureJson {
                    index: s.guardian_index,
                    signature: format!("0x{}", hex::encode(s.to_bytes())),
                }).collect(),
                timestamp: vaa.timestamp,
                nonce: vaa.nonce,
                emitter_chain: vaa.emitter_chain,
                emitter_address: format!("0x{}", vaa.emitter_address.to_hex()),
                sequence: vaa.sequence,
                consistency_level: vaa.consistency_level,
                payload: format!("0x{}", hex::encode(&vaa.payload)),
            }
        }
    }

    fn error(status: StatusCode, code: &str, message: String) -> axum::response::Response {
        (
            status,
            Json(ErrorResponse {
                error: ErrorInfo {
                    code: code.to_string(),
                    message,
                },
            }),
        ).into_response()
    }

    pub async fn get_signed_vaa(
        State(state): State<Arc<AppState>>,
        Path((chain, emitter, sequence)): Path<(u16, String, u64)>,
    ) -> impl IntoResponse {
        // Canonical 64-char form; 40-char EVM addresses are padded.
        let emitter = match hex::decode(emitter.trim_start_matches("0x")) {
            Ok(bytes) if bytes.len() == 32 || bytes.len() == 20 => Address::from_native(&bytes),
            _ => {
                return error(
                    StatusCode::BAD_REQUEST,
                    "INVALID_ADDRESS",
                    "Invalid emitter address format".to_string(),
                );
            }
        };

        match state.store.get_vaa_bytes(chain, &emitter, sequence).await {
            Some(bytes) => {
                let vaa = VAA::decode(&bytes).ok().map(VAAJson::from);
                (
                    StatusCode::OK,
                    Json(VAAResponse {
                        vaa_bytes: base64::engine::general_purpose::STANDARD.encode(&bytes),
                        vaa,
                    }),
                ).into_response()
            }
            None => error(
                StatusCode::NOT_FOUND,
                "VAA_NOT_FOUND",
                format!(
                    "No message found for chain={}, emitter={}, sequence={}",
                    chain, emitter, sequence
                ),
            ),
        }
    }

    pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "ok",
            "attestations": state.store.len().await,
        }))
    }
}
