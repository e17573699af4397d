use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use longpoll_core::{start_sweeper, EventHub};
use longpoll_telemetry::MetricsRecorder;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers;
use crate::shutdown::ShutdownCoordinator;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<EventHub>,
    pub metrics: Arc<MetricsRecorder>,
    /// Cancelled when the server starts shutting down; releases waiting polls.
    pub shutdown: CancellationToken,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(hub: Arc<EventHub>, shutdown: CancellationToken) -> Self {
        Self {
            hub,
            metrics: Arc::new(MetricsRecorder::new()),
            shutdown,
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/subscribe/{client_id}", get(handlers::subscribe_handler))
        .route("/poll/{client_id}", get(handlers::poll_handler))
        .route("/publish/{client_id}", post(handlers::publish_handler))
        .route("/subscribe/", get(handlers::missing_client_id))
        .route("/poll/", get(handlers::missing_client_id))
        .route("/publish/", post(handlers::missing_client_id))
        .route("/health", get(handlers::health_handler))
        .route("/stats", get(handlers::stats_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener, then start the HTTP server and the idle-client sweeper.
///
/// Failing to bind is the only error; the caller treats it as fatal.
pub async fn start(config: ServerConfig, hub: Arc<EventHub>) -> Result<ServerHandle, std::io::Error> {
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    let local_addr = listener.local_addr()?;

    let shutdown = Arc::new(ShutdownCoordinator::new());

    let state = AppState::new(hub, shutdown.token());
    let hub_config = state.hub.config().clone();
    let metrics = Arc::clone(&state.metrics);
    let sweeper = start_sweeper(
        Arc::clone(state.hub.registry()),
        hub_config.sweep_interval,
        hub_config.idle_threshold,
        shutdown.token(),
        move |report| handlers::record_sweep(&metrics, report),
    );
    tracing::info!(
        poll_timeout_ms = hub_config.poll_timeout.as_millis() as u64,
        idle_threshold_ms = hub_config.idle_threshold.as_millis() as u64,
        sweep_interval_ms = hub_config.sweep_interval.as_millis() as u64,
        "Idle client sweeper started"
    );

    let router = build_router(state.clone());

    let token = shutdown.token();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!(addr = %local_addr, "Longpoll server started");

    Ok(ServerHandle {
        port: local_addr.port(),
        state,
        shutdown,
        shutdown_timeout: config.shutdown_timeout,
        server,
        sweeper,
    })
}

/// Handle returned by `start()`. Keeps background tasks alive until
/// [`ServerHandle::shutdown`] is called.
pub struct ServerHandle {
    pub port: u16,
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
    shutdown_timeout: std::time::Duration,
    server: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl ServerHandle {
    /// State shared with the handlers (hub, metrics).
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop accepting requests, release waiting polls, stop the sweeper.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down");
        self.shutdown
            .graceful_shutdown(vec![self.server, self.sweeper], self.shutdown_timeout)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use longpoll_core::{ClientId, HubConfig};
    use std::time::Duration;
    use tower::ServiceExt;

    fn quick_hub() -> Arc<EventHub> {
        Arc::new(EventHub::new(HubConfig {
            poll_timeout: Duration::from_millis(200),
            ..HubConfig::default()
        }))
    }

    fn app(hub: Arc<EventHub>) -> Router {
        build_router(AppState::new(hub, CancellationToken::new()))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn publish_req(id: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/publish/{id}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn subscribe_returns_client_id() {
        let hub = quick_hub();
        let resp = app(Arc::clone(&hub)).oneshot(get_req("/subscribe/abc")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["clientId"], "abc");
        assert!(hub.registry().contains(&ClientId::parse("abc").unwrap()));
    }

    #[tokio::test]
    async fn poll_times_out_with_no_content() {
        let hub = quick_hub();
        let resp = app(Arc::clone(&hub)).oneshot(get_req("/poll/b")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(hub.registry().len(), 1);
    }

    #[tokio::test]
    async fn publish_then_poll_delivers_event() {
        let hub = quick_hub();
        let router = app(Arc::clone(&hub));

        router.clone().oneshot(get_req("/subscribe/a")).await.unwrap();
        let resp = router
            .clone()
            .oneshot(publish_req("a", r#"{"message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["message"], "Event published.");

        let resp = router.oneshot(get_req("/poll/a")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let event = body_json(resp).await;
        assert_eq!(event["message"], "hi");
        assert!(event["time"].is_string());
    }

    #[tokio::test]
    async fn publish_to_unknown_client_is_404() {
        let hub = quick_hub();
        let resp = app(Arc::clone(&hub))
            .oneshot(publish_req("ghost", r#"{"message":"x"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"], "Client not found");
        assert!(hub.registry().is_empty());
    }

    #[tokio::test]
    async fn second_publish_is_503() {
        let hub = quick_hub();
        let router = app(hub);
        router.clone().oneshot(get_req("/subscribe/a")).await.unwrap();

        let first = router
            .clone()
            .oneshot(publish_req("a", r#"{"message":"one"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router
            .clone()
            .oneshot(publish_req("a", r#"{"message":"two"}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_json(second).await["error"],
            "Client channel is full, skipping event."
        );

        let resp = router.oneshot(get_req("/poll/a")).await.unwrap();
        assert_eq!(body_json(resp).await["message"], "one");
    }

    #[tokio::test]
    async fn malformed_publish_body_is_400() {
        let hub = quick_hub();
        let router = app(hub);
        router.clone().oneshot(get_req("/subscribe/a")).await.unwrap();

        for body in ["not json", "{}", r#"{"msg":"x"}"#, r#"{"message":""}"#] {
            let resp = router.clone().oneshot(publish_req("a", body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert!(body_json(resp).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn missing_client_id_is_400() {
        let hub = quick_hub();
        let resp = app(Arc::clone(&hub)).oneshot(get_req("/poll/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "clientId is required");

        let resp = app(Arc::clone(&hub))
            .oneshot(publish_req("", r#"{"message":"x"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(hub.registry().is_empty());
    }

    #[tokio::test]
    async fn shutdown_releases_waiting_poll() {
        let hub = Arc::new(EventHub::new(HubConfig::default()));
        let token = CancellationToken::new();
        let router = build_router(AppState::new(hub, token.clone()));

        let poll = tokio::spawn(router.oneshot(get_req("/poll/a")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let resp = tokio::time::timeout(Duration::from_secs(2), poll)
            .await
            .expect("poll should end on shutdown")
            .unwrap()
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn health_and_stats() {
        let hub = quick_hub();
        let router = app(hub);
        router.clone().oneshot(get_req("/subscribe/a")).await.unwrap();
        router
            .clone()
            .oneshot(publish_req("a", r#"{"message":"x"}"#))
            .await
            .unwrap();

        let health = body_json(router.clone().oneshot(get_req("/health")).await.unwrap()).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["clients"], 1);

        let stats = body_json(router.oneshot(get_req("/stats")).await.unwrap()).await;
        assert_eq!(stats["clients"], 1);
        assert_eq!(stats["clients_evicted_total"], 0);
        let metrics = stats["metrics"].as_array().unwrap();
        assert!(metrics
            .iter()
            .any(|m| m["name"] == "publish_total" && m["labels"]["result"] == "accepted"));
        assert!(metrics
            .iter()
            .any(|m| m["name"] == "clients_active" && m["value"] == 1.0));
    }

    #[tokio::test]
    async fn server_round_trip_over_http() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        let handle = start(config, quick_hub()).await.unwrap();
        assert!(handle.port > 0);
        let base = format!("http://127.0.0.1:{}", handle.port);
        let client = reqwest::Client::new();

        let resp = client.get(format!("{base}/subscribe/a")).send().await.unwrap();
        assert_eq!(resp.status(), 200);

        // Poll blocks until the publish lands.
        let poll = {
            let client = client.clone();
            let url = format!("{base}/poll/a");
            tokio::spawn(async move { client.get(url).send().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let published_at = chrono::Utc::now();
        let resp = client
            .post(format!("{base}/publish/a"))
            .json(&serde_json::json!({ "message": "hi" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = poll.await.unwrap().unwrap();
        assert_eq!(resp.status(), 200);
        let event: longpoll_core::Event = resp.json().await.unwrap();
        assert_eq!(event.message, "hi");
        assert!(event.time >= published_at);

        // Nothing pending: the next poll times out.
        let resp = client.get(format!("{base}/poll/a")).send().await.unwrap();
        assert_eq!(resp.status(), 204);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let first = start(
            ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
                ..ServerConfig::default()
            },
            quick_hub(),
        )
        .await
        .unwrap();

        let taken = ServerConfig {
            host: "127.0.0.1".into(),
            port: first.port,
            ..ServerConfig::default()
        };
        assert!(start(taken, quick_hub()).await.is_err());
        first.shutdown().await;
    }
}
