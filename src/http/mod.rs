//! HTTP surface for the payment flow.
//!
//! Three routes, mounted by the host application:
//! - `POST /payment/callback`: the gateway's success callback;
//! - `POST /payment/callback/failure`: the gateway's failure callback
//!   (best-effort cleanup, always 200);
//! - `GET /payment/status/{unique_id}`: status polling for the
//!   redirect page.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::checkout::pending::CheckoutStore;
use crate::checkout::reconcile::{CallbackPayload, ReconciliationEngine};
use crate::ledger::manager::UserDirectory;
use crate::ledger::store::LedgerStore;

/// Build the payment router around a reconciliation engine.
pub fn payment_routes<C, S, U>(engine: Arc<ReconciliationEngine<C, S, U>>) -> Router
where
    C: CheckoutStore + Send + Sync + 'static,
    S: LedgerStore + Send + Sync + 'static,
    U: UserDirectory + Send + Sync + 'static,
{
    Router::new()
        .route("/payment/callback", post(payment_callback::<C, S, U>))
        .route(
            "/payment/callback/failure",
            post(payment_failure::<C, S, U>),
        )
        .route(
            "/payment/status/{unique_id}",
            get(payment_status::<C, S, U>),
        )
        .with_state(engine)
}

async fn payment_callback<C, S, U>(
    State(engine): State<Arc<ReconciliationEngine<C, S, U>>>,
    Json(payload): Json<CallbackPayload>,
) -> Response
where
    C: CheckoutStore + Send + Sync + 'static,
    S: LedgerStore + Send + Sync + 'static,
    U: UserDirectory + Send + Sync + 'static,
{
    match engine.process_callback(payload).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "transaction_id": outcome.transaction.id,
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct FailureCallback {
    #[serde(alias = "uniqueId")]
    unique_id: String,
}

async fn payment_failure<C, S, U>(
    State(engine): State<Arc<ReconciliationEngine<C, S, U>>>,
    Json(payload): Json<FailureCallback>,
) -> Response
where
    C: CheckoutStore + Send + Sync + 'static,
    S: LedgerStore + Send + Sync + 'static,
    U: UserDirectory + Send + Sync + 'static,
{
    // Cleanup only; the gateway always gets a success response so it
    // does not retry failure notifications.
    engine.process_failure(&payload.unique_id).await;
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

async fn payment_status<C, S, U>(
    State(engine): State<Arc<ReconciliationEngine<C, S, U>>>,
    Path(unique_id): Path<String>,
) -> Response
where
    C: CheckoutStore + Send + Sync + 'static,
    S: LedgerStore + Send + Sync + 'static,
    U: UserDirectory + Send + Sync + 'static,
{
    match engine.payment_status(&unique_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::pending::memory::InMemoryCheckoutStore;
    use crate::checkout::reconcile::PaymentStatus;
    use crate::ledger::manager::LedgerManager;
    use crate::ledger::memory::InMemoryLedgerStore;
    use crate::testing::InMemoryUserDirectory;

    #[test]
    fn status_serializes_with_tag() {
        let status = PaymentStatus::Completed {
            transaction_id: "tx1".to_string(),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(
            value,
            json!({"status": "completed", "transaction_id": "tx1"})
        );

        let value = serde_json::to_value(PaymentStatus::Pending).unwrap();
        assert_eq!(value, json!({"status": "pending"}));
    }

    #[tokio::test]
    async fn router_builds() {
        let users = InMemoryUserDirectory::new();
        let engine = Arc::new(ReconciliationEngine::new(
            InMemoryCheckoutStore::new(),
            LedgerManager::new(InMemoryLedgerStore::new(), users),
        ));
        let _router = payment_routes(engine);
    }
}
