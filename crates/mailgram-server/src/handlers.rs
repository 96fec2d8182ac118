//! Request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use tracing::info;

use mailgram_classifier::DigestPeriod;
use mailgram_pipeline::EventOutcome;

use crate::envelope::PushEnvelope;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// `GET /api/health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /gmail/push` — push-notification intake.
///
/// 204 for handled events and intentional drops, 400 for unparseable
/// envelopes, 500 when processing failed and the sender should redeliver.
pub async fn gmail_push(
    State(state): State<AppState>,
    envelope: Result<Json<PushEnvelope>, JsonRejection>,
) -> ServerResult<StatusCode> {
    let Json(envelope) = envelope.map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let event = envelope.decode().map_err(ServerError::BadRequest)?;

    let mailbox = event.mailbox.clone();
    let checkpoint = event.checkpoint;
    let outcome = state.pipeline.handle_push(event).await?;

    match outcome {
        EventOutcome::Handled { delivered, skipped } => {
            info!(mailbox = %mailbox, checkpoint, delivered, skipped, "Push event handled");
        }
        EventOutcome::Duplicate => {
            info!(mailbox = %mailbox, checkpoint, "Push event already processed");
        }
        EventOutcome::UnknownMailbox => {
            info!(mailbox = %mailbox, checkpoint, "Push event for untracked mailbox");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /gmail/resubscribe` — credential re-validation and watch renewal
/// sweep, meant to be triggered on a schedule.
pub async fn resubscribe(State(state): State<AppState>) -> ServerResult<StatusCode> {
    let report = state.pipeline.resubscribe_all().await?;
    info!(renewed = report.renewed, failed = report.failed, "Resubscription sweep finished");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /digest/{morning|evening|daily}` — digest generation trigger.
pub async fn digest(
    State(state): State<AppState>,
    Path(period): Path<String>,
) -> ServerResult<StatusCode> {
    let period = DigestPeriod::from_slug(&period)
        .ok_or_else(|| ServerError::BadRequest(format!("unknown digest period: {}", period)))?;

    let sent = state.pipeline.send_digests(period).await?;
    info!(sent, "Digest sweep finished");
    Ok(StatusCode::NO_CONTENT)
}
