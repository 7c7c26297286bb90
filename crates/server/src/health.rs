use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::dispatcher::Dispatcher;

#[derive(Clone)]
pub struct HealthState {
    dispatcher: Dispatcher,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub dispatcher: HealthCheck,
    pub checked_at: String,
}

pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { dispatcher })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let dispatcher = dispatcher_check(&state.dispatcher);
    let ready = dispatcher.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "genie-relay-server runtime initialized".to_string(),
        },
        dispatcher,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn dispatcher_check(dispatcher: &Dispatcher) -> HealthCheck {
    if dispatcher.is_accepting() {
        HealthCheck {
            status: "ready",
            detail: format!(
                "{} of {} queue slots used, {} concurrent tasks allowed",
                dispatcher.queued(),
                dispatcher.queue_capacity(),
                dispatcher.max_concurrent_tasks()
            ),
        }
    } else {
        HealthCheck { status: "degraded", detail: "dispatch queue is closed".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use genie_relay_core::config::DispatchConfig;
    use tower::ServiceExt;

    use crate::dispatcher::{Dispatcher, Job, JobHandler};
    use crate::health::{health, router, HealthState};

    struct Ignore;

    #[async_trait]
    impl JobHandler for Ignore {
        async fn handle(&self, _job: Job) {}
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::spawn(&DispatchConfig { max_concurrent_tasks: 2, queue_capacity: 8 }, Arc::new(Ignore))
    }

    #[tokio::test]
    async fn health_returns_ready_when_dispatcher_accepts_work() {
        let (status, Json(payload)) = health(State(HealthState { dispatcher: dispatcher() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.dispatcher.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert!(payload.dispatcher.detail.contains("of 8 queue slots"));
    }

    #[test]
    fn health_returns_service_unavailable_when_queue_is_closed() {
        // Dropping the runtime that owns the drain task drops the receiving end.
        let owner = tokio::runtime::Runtime::new().expect("runtime");
        let closed = owner.block_on(async { dispatcher() });
        drop(owner);

        let checker = tokio::runtime::Runtime::new().expect("runtime");
        let (status, Json(payload)) =
            checker.block_on(health(State(HealthState { dispatcher: closed })));

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.dispatcher.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_route_serves_json() {
        let response = router(dispatcher())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").and_then(|value| value.to_str().ok()),
            Some("application/json")
        );
    }
}
