//! HTTP surface: gateway webhooks plus health and admin endpoints.
//!
//! Gateway adapters always answer 200 with a gateway-shaped body, even for
//! malformed requests, so the handset sees an `END` screen instead of a
//! transport error.

use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::registration::ExportFormat;
use crate::ussd::{UssdEngine, UssdResponse, WireResponse};

/// Wire text returned when a request cannot be handed to the engine.
pub const GATEWAY_ERROR: &str = "END System error. Please try again later.";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<UssdEngine>,
}

/// Build the router with the gateway webhooks and admin routes.
pub fn ussd_routes(engine: Arc<UssdEngine>) -> Router {
    let state = AppState { engine };

    let admin = Router::new()
        .route("/api/registrations/stats", get(registration_stats))
        .route("/api/registrations/export", get(export_registrations))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(health))
        .route("/ussd/africastalking", post(africastalking_webhook))
        .route("/ussd/generic", post(generic_webhook))
        .merge(admin)
        .with_state(state)
}

// ── Gateway adapters ────────────────────────────────────────────────────

/// Africa's Talking callback body (form-encoded).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AfricasTalkingRequest {
    session_id: Option<String>,
    phone_number: Option<String>,
    #[serde(default)]
    text: String,
}

/// JSON body for gateways without a fixed callback shape.
#[derive(Debug, Deserialize)]
struct GenericRequest {
    session_id: Option<String>,
    phone_number: Option<String>,
    #[serde(default)]
    text: String,
}

/// One turn, ready for the engine.
struct Turn {
    session_id: String,
    phone_number: String,
    text: String,
}

impl Turn {
    fn from_fields(
        session_id: Option<String>,
        phone_number: Option<String>,
        text: String,
    ) -> Option<Self> {
        let session_id = session_id.filter(|s| !s.is_empty())?;
        let phone_number = phone_number.filter(|s| !s.is_empty())?;
        Some(Self {
            session_id,
            phone_number,
            text,
        })
    }
}

/// Run the turn on its own task so a panic in the engine becomes an error
/// screen instead of a dropped connection.
async fn run_turn(engine: Arc<UssdEngine>, turn: Turn) -> Option<UssdResponse> {
    let session_id = turn.session_id.clone();
    let task = tokio::spawn(async move {
        engine
            .handle(&turn.phone_number, &turn.text, &turn.session_id)
            .await
    });

    match task.await {
        Ok(response) => Some(response),
        Err(e) => {
            error!(session_id = %session_id, "USSD turn failed: {}", e);
            None
        }
    }
}

async fn africastalking_webhook(
    State(state): State<AppState>,
    body: Result<Form<AfricasTalkingRequest>, FormRejection>,
) -> String {
    let turn = match body {
        Ok(Form(req)) => Turn::from_fields(req.session_id, req.phone_number, req.text),
        Err(e) => {
            warn!(error = %e, "Undecodable Africa's Talking callback");
            None
        }
    };
    let Some(turn) = turn else {
        warn!("Africa's Talking callback missing sessionId or phoneNumber");
        return GATEWAY_ERROR.to_string();
    };

    match run_turn(state.engine, turn).await {
        Some(response) => response.to_wire(),
        None => GATEWAY_ERROR.to_string(),
    }
}

async fn generic_webhook(
    State(state): State<AppState>,
    body: Result<Json<GenericRequest>, JsonRejection>,
) -> Json<WireResponse> {
    let turn = match body {
        Ok(Json(req)) => Turn::from_fields(req.session_id, req.phone_number, req.text),
        Err(e) => {
            warn!(error = %e, "Undecodable generic USSD request");
            None
        }
    };

    let response = match turn {
        Some(turn) => run_turn(state.engine, turn).await,
        None => None,
    };

    Json(match response {
        Some(response) => WireResponse::from(&response),
        None => WireResponse {
            response: GATEWAY_ERROR.to_string(),
            continue_session: false,
        },
    })
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ussd-registration",
        "activeSessions": state.engine.sessions().len().await,
        "registrations": state.engine.ledger().len().await,
    }))
}

// ── Admin ───────────────────────────────────────────────────────────────

async fn registration_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.ledger().stats().await)
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

async fn export_registrations(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> impl IntoResponse {
    let format = match query.format.as_deref().unwrap_or("json").parse::<ExportFormat>() {
        Ok(format) => format,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": e })))
                .into_response();
        }
    };

    match state.engine.ledger().export(format).await {
        Ok(body) => {
            let extension = match format {
                ExportFormat::Json => "json",
                ExportFormat::Csv => "csv",
            };
            (
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"registrations.{extension}\""),
                    ),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!("Registration export failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Export failed" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::UssdConfig;
    use crate::notify::LogNotifier;
    use crate::registration::{RegistrationFinalizer, RegistrationLedger};
    use crate::store::MemoryRegistrationStore;
    use crate::ussd::{SessionStore, SystemClock};

    fn app() -> Router {
        let config = UssdConfig::default();
        let sessions = SessionStore::new(config.session_timeout, Arc::new(SystemClock));
        let finalizer = RegistrationFinalizer::new(
            &config,
            RegistrationLedger::new(),
            Arc::new(MemoryRegistrationStore::new()),
            Arc::new(LogNotifier::new(&config.helpline)),
            Arc::new(SystemClock),
        );
        ussd_routes(Arc::new(UssdEngine::new(&config, sessions, finalizer)))
    }

    fn form(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ussd/africastalking")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ussd/generic")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn africastalking_returns_marker_prefixed_text() {
        let app = app();
        let response = app
            .clone()
            .oneshot(form(
                "sessionId=at1&phoneNumber=%2B254712345678&serviceCode=%2A386%2A55%23&text=",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.starts_with("CON Welcome to"));

        let response = app
            .oneshot(form("sessionId=at1&phoneNumber=%2B254712345678&text=0"))
            .await
            .unwrap();
        assert!(body_text(response).await.starts_with("END Thank you"));
    }

    #[tokio::test]
    async fn africastalking_missing_fields_is_generic_error() {
        let response = app().oneshot(form("text=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, GATEWAY_ERROR);
    }

    #[tokio::test]
    async fn generic_returns_structured_body() {
        let response = app()
            .oneshot(json(
                r#"{"session_id":"g1","phone_number":"+254712345678","text":"9"}"#,
            ))
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["continue_session"], true);
        assert!(body["response"]
            .as_str()
            .unwrap()
            .contains("(Attempt 1/3)"));
    }

    #[tokio::test]
    async fn generic_malformed_body_is_generic_error() {
        let response = app().oneshot(json("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: WireResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body.response, GATEWAY_ERROR);
        assert!(!body.continue_session);
    }

    #[tokio::test]
    async fn export_rejects_unknown_format() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/registrations/export?format=xlsx")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn export_csv_sets_content_type() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/registrations/export?format=csv")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert!(body_text(response).await.starts_with("Registration ID,"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["registrations"], 0);
    }
}
