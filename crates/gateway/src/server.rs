use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode, header::AUTHORIZATION},
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    relay_botframework::{Activity, Error as ChannelError},
    relay_config::RelayConfig,
    serde::Deserialize,
    tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer},
    tracing::{debug, info, warn},
};

use crate::state::GatewayState;

/// Activities are small JSON documents; attachments travel by URL.
const MAX_ACTIVITY_BYTES: usize = 1024 * 1024;

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub secret: Option<String>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/messages", post(messages_handler))
        .layer(RequestBodyLimitLayer::new(MAX_ACTIVITY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { gateway: state })
}

/// Start the gateway HTTP server and serve until Ctrl-C.
pub async fn start_gateway(config: &RelayConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = GatewayState::from_config(config);
    let app = build_gateway_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        backend = %config.backend.url,
        timeout_secs = config.backend.timeout_secs,
        "relay listening on /api/messages"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
        })
        .await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = &state.gateway;
    Json(serde_json::json!({
        "status": "ok",
        "version": gateway.version,
        "uptime_secs": gateway.started_at.elapsed().as_secs(),
        "turns_in_flight": gateway.turns_in_flight(),
        "turns_total": gateway.turns_total(),
    }))
}

/// Accept an activity and answer `202` before the turn runs.
///
/// The reply travels back through the connector, so holding the request open
/// for the backend call would only invite channel retries. Nothing from the
/// activity (its `serviceUrl` in particular) is used until the channel token
/// has been verified.
async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !state
        .gateway
        .webhook_secret_matches(query.secret.as_deref())
    {
        warn!("rejected activity with invalid webhook secret");
        return StatusCode::UNAUTHORIZED;
    }

    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(activity) => activity,
        Err(e) => {
            debug!(error = %e, "unparseable activity");
            return StatusCode::BAD_REQUEST;
        },
    };

    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    match state
        .gateway
        .authenticator
        .authenticate(authorization, &activity)
        .await
    {
        Ok(()) => {},
        Err(e @ ChannelError::SigningKeys { .. }) => {
            warn!(error = %e, "cannot verify activity");
            return StatusCode::SERVICE_UNAVAILABLE;
        },
        Err(e) => {
            warn!(error = %e, "rejected unauthenticated activity");
            return StatusCode::UNAUTHORIZED;
        },
    }

    let gateway = Arc::clone(&state.gateway);
    let guard = gateway.begin_turn();
    tokio::spawn(async move {
        let outcome = gateway.adapter.process(activity).await;
        debug!(?outcome, "activity processed");
        drop(guard);
    });

    StatusCode::ACCEPTED
}
