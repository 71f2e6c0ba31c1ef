use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use {
    relay_auth::DefaultCredential,
    relay_botframework::{BotAdapter, BotFrameworkOutbound, ChannelAuthenticator, ConnectorAuth},
    relay_config::RelayConfig,
    relay_core::TurnRelay,
    secrecy::{ExposeSecret, Secret},
    tracing::{info, warn},
};

/// Shared, immutable after startup apart from the turn counters.
pub struct GatewayState {
    pub adapter: Arc<BotAdapter>,
    /// Verifies the channel token on every inbound activity.
    pub authenticator: ChannelAuthenticator,
    /// Expected `?secret=` on `/api/messages`, when configured.
    pub webhook_secret: Option<Secret<String>>,
    /// Server version string.
    pub version: String,
    pub started_at: Instant,
    turns_in_flight: AtomicU64,
    turns_total: AtomicU64,
}

impl GatewayState {
    pub fn new(
        adapter: Arc<BotAdapter>,
        authenticator: ChannelAuthenticator,
        webhook_secret: Option<Secret<String>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            adapter,
            authenticator,
            webhook_secret,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            turns_in_flight: AtomicU64::new(0),
            turns_total: AtomicU64::new(0),
        })
    }

    /// Wire the credential chain, relay, and connector from configuration.
    pub fn from_config(config: &RelayConfig) -> Arc<Self> {
        let http = reqwest::Client::new();

        let credentials = DefaultCredential::from_settings(&config.credentials, http.clone());
        info!(sources = ?credentials.source_names(), "backend credential chain");
        let relay = Arc::new(TurnRelay::with_http(
            config,
            Arc::new(credentials),
            http.clone(),
        ));

        let auth = ConnectorAuth::from_config(&config.bot, &config.credentials, http.clone());
        let authenticator = ChannelAuthenticator::from_config(&config.bot, http.clone());
        if !authenticator.is_enabled() {
            warn!("no MicrosoftAppId set, inbound activities are not verified and replies are sent unauthenticated");
        }
        let outbound = Arc::new(BotFrameworkOutbound::new(http, auth));

        Self::new(
            Arc::new(BotAdapter::new(relay, outbound)),
            authenticator,
            config.bot.webhook_secret.clone(),
        )
    }

    /// `true` when no secret is configured or `given` matches it.
    pub fn webhook_secret_matches(&self, given: Option<&str>) -> bool {
        match self
            .webhook_secret
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|s| !s.is_empty())
        {
            Some(expected) => given.is_some_and(|given| constant_time_eq(given, expected)),
            None => true,
        }
    }

    /// Count a turn as started; it is counted as finished when the guard drops.
    pub fn begin_turn(self: &Arc<Self>) -> TurnGuard {
        self.turns_in_flight.fetch_add(1, Ordering::Relaxed);
        self.turns_total.fetch_add(1, Ordering::Relaxed);
        TurnGuard {
            state: Arc::clone(self),
        }
    }

    pub fn turns_in_flight(&self) -> u64 {
        self.turns_in_flight.load(Ordering::Relaxed)
    }

    pub fn turns_total(&self) -> u64 {
        self.turns_total.load(Ordering::Relaxed)
    }
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

pub struct TurnGuard {
    state: Arc<GatewayState>,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.state.turns_in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
