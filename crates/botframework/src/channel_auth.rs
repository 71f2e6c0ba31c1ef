//! Verification of the bearer token the Bot Framework channel service attaches
//! to every inbound activity.
//!
//! Tokens are RS256 JWTs signed with keys published through the channel
//! service's OpenID configuration. A request is accepted only when the
//! signature, issuer, audience (the bot's app id) and expiry check out and the
//! token's `serviceurl` claim names the same connector the activity does.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header},
    relay_config::BotConfig,
    serde::{Deserialize, de::DeserializeOwned},
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use crate::{
    activity::Activity,
    error::{Error, Result},
};

/// `iss` of tokens minted by the Bot Framework channel service.
pub const CHANNEL_ISSUER: &str = "https://api.botframework.com";

const CLOCK_SKEW_SECS: u64 = 300;
const KEYS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// An unknown `kid` forces a refresh at most this often.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct OpenIdMetadata {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    #[serde(default)]
    kty: String,
    n: Option<String>,
    e: Option<String>,
    /// Channels this key may sign for.
    #[serde(default)]
    endorsements: Vec<String>,
}

struct SigningKey {
    key: DecodingKey,
    endorsements: Vec<String>,
}

struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,
    fetched_at: Instant,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelClaims {
    serviceurl: Option<String>,
}

/// Gatekeeper for `/api/messages`.
pub struct ChannelAuthenticator {
    /// `None` in emulator mode, where nothing is verified.
    app_id: Option<String>,
    metadata_url: String,
    http: reqwest::Client,
    keys: Mutex<Option<KeySet>>,
}

impl ChannelAuthenticator {
    pub fn disabled() -> Self {
        Self {
            app_id: None,
            metadata_url: String::new(),
            http: reqwest::Client::new(),
            keys: Mutex::new(None),
        }
    }

    pub fn new(
        app_id: impl Into<String>,
        metadata_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            app_id: Some(app_id.into()),
            metadata_url: metadata_url.into(),
            http,
            keys: Mutex::new(None),
        }
    }

    pub fn from_config(bot: &BotConfig, http: reqwest::Client) -> Self {
        if bot.is_anonymous() {
            return Self::disabled();
        }
        Self::new(bot.app_id.trim(), bot.openid_metadata_url.as_str(), http)
    }

    pub fn is_enabled(&self) -> bool {
        self.app_id.is_some()
    }

    /// Check the `Authorization` header of an inbound request against the
    /// activity it carries.
    pub async fn authenticate(&self, authorization: Option<&str>, activity: &Activity) -> Result<()> {
        let Some(app_id) = self.app_id.as_deref() else {
            return Ok(());
        };

        let token = authorization
            .and_then(bearer_token)
            .ok_or_else(|| Error::unauthenticated("missing bearer token"))?;
        let header = decode_header(token).map_err(Error::unauthenticated)?;
        if header.alg != Algorithm::RS256 {
            return Err(Error::unauthenticated(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| Error::unauthenticated("token has no key id"))?;
        let key = self.signing_key(&kid).await?;

        if let Some(channel) = activity.channel_id.as_deref()
            && !key.endorsements.is_empty()
            && !key
                .endorsements
                .iter()
                .any(|e| e.eq_ignore_ascii_case(channel))
        {
            return Err(Error::unauthenticated(format!(
                "signing key is not endorsed for channel '{channel}'"
            )));
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[CHANNEL_ISSUER]);
        validation.set_audience(&[app_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = CLOCK_SKEW_SECS;
        let claims = decode::<ChannelClaims>(token, &key.key, &validation)
            .map_err(Error::unauthenticated)?
            .claims;

        match (claims.serviceurl.as_deref(), activity.service_url.as_deref()) {
            (Some(claimed), Some(given)) if claimed == given => Ok(()),
            (claimed, given) => Err(Error::unauthenticated(format!(
                "serviceUrl {given:?} does not match token claim {claimed:?}"
            ))),
        }
    }

    async fn signing_key(&self, kid: &str) -> Result<Arc<SigningKey>> {
        let mut guard = self.keys.lock().await;
        let refresh = match guard.as_ref() {
            None => true,
            Some(set) => {
                let age = set.fetched_at.elapsed();
                age > KEYS_TTL || (!set.keys.contains_key(kid) && age > MIN_REFRESH_INTERVAL)
            },
        };
        if refresh {
            match self.fetch_keys().await {
                Ok(set) => *guard = Some(set),
                Err(e) if guard.is_some() => {
                    warn!(error = %e, "signing key refresh failed, keeping previous keys");
                },
                Err(e) => return Err(e),
            }
        }

        guard
            .as_ref()
            .and_then(|set| set.keys.get(kid))
            .cloned()
            .ok_or_else(|| Error::unauthenticated(format!("unknown signing key '{kid}'")))
    }

    async fn fetch_keys(&self) -> Result<KeySet> {
        tokio::time::timeout(FETCH_TIMEOUT, self.download_keys())
            .await
            .map_err(|_| Error::signing_keys(&self.metadata_url, "timed out"))?
    }

    async fn download_keys(&self) -> Result<KeySet> {
        let metadata: OpenIdMetadata = self.fetch_json(&self.metadata_url).await?;
        let jwks: JwkSet = self.fetch_json(&metadata.jwks_uri).await?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            if !jwk.kty.eq_ignore_ascii_case("RSA") {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            match DecodingKey::from_rsa_components(&n, &e) {
                Ok(key) => {
                    keys.insert(
                        kid,
                        Arc::new(SigningKey {
                            key,
                            endorsements: jwk.endorsements,
                        }),
                    );
                },
                Err(err) => debug!(%kid, error = %err, "skipping unusable signing key"),
            }
        }
        info!(keys = keys.len(), "channel signing keys refreshed");
        Ok(KeySet {
            keys,
            fetched_at: Instant::now(),
        })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::signing_keys(url, e))?;
        if !resp.status().is_success() {
            return Err(Error::signing_keys(
                url,
                format!("status {}", resp.status()),
            ));
        }
        resp.json().await.map_err(|e| Error::signing_keys(url, e))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SIGNING_KEY: &str = include_str!("../tests/fixtures/channel_signing_key.pem");
    const JWKS: &str = include_str!("../tests/fixtures/channel_jwks.json");
    const KID: &str = "relay-test-key";
    const SERVICE_URL: &str = "https://smba.trafficmanager.net/amer/";

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn claims() -> serde_json::Value {
        serde_json::json!({
            "iss": CHANNEL_ISSUER,
            "aud": "app-1",
            "exp": now() + 3600,
            "nbf": now() - 10,
            "serviceurl": SERVICE_URL,
        })
    }

    fn bearer_with_kid(claims: &serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.into());
        let key = EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap();
        format!("Bearer {}", encode(&header, claims, &key).unwrap())
    }

    fn bearer(claims: &serde_json::Value) -> String {
        bearer_with_kid(claims, KID)
    }

    fn activity(channel: &str) -> Activity {
        serde_json::from_value(serde_json::json!({
            "type": "message",
            "serviceUrl": SERVICE_URL,
            "channelId": channel,
            "conversation": { "id": "conv-1" },
        }))
        .unwrap()
    }

    struct KeyServer {
        server: mockito::ServerGuard,
        metadata: mockito::Mock,
        keys: mockito::Mock,
    }

    /// Serves the OpenID configuration and key set, each expected `fetches` times.
    async fn key_server_expecting(fetches: usize) -> KeyServer {
        let mut server = mockito::Server::new_async().await;
        let metadata = server
            .mock("GET", "/v1/.well-known/openidconfiguration")
            .expect(fetches)
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "issuer": CHANNEL_ISSUER,
                    "jwks_uri": format!("{}/v1/.well-known/keys", server.url()),
                })
                .to_string(),
            )
            .create_async()
            .await;
        let keys = server
            .mock("GET", "/v1/.well-known/keys")
            .expect(fetches)
            .with_status(200)
            .with_body(JWKS)
            .create_async()
            .await;
        KeyServer {
            server,
            metadata,
            keys,
        }
    }

    async fn key_server() -> KeyServer {
        key_server_expecting(1).await
    }

    fn authenticator(keys: &KeyServer) -> ChannelAuthenticator {
        ChannelAuthenticator::new(
            "app-1",
            format!("{}/v1/.well-known/openidconfiguration", keys.server.url()),
            reqwest::Client::new(),
        )
    }

    async fn rejection(claims: serde_json::Value, channel: &str) -> Error {
        let keys = key_server().await;
        authenticator(&keys)
            .authenticate(Some(bearer(&claims).as_str()), &activity(channel))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn signed_channel_token_is_accepted_and_keys_are_reused() {
        let keys = key_server_expecting(1).await;
        let auth = authenticator(&keys);

        for _ in 0..3 {
            auth.authenticate(Some(bearer(&claims()).as_str()), &activity("msteams"))
                .await
                .unwrap();
        }
        keys.metadata.assert_async().await;
        keys.keys.assert_async().await;
    }

    #[tokio::test]
    async fn missing_header_is_rejected_without_fetching_keys() {
        let keys = key_server_expecting(0).await;
        let auth = authenticator(&keys);

        for header in [None, Some(""), Some("Basic abc"), Some("Bearer ")] {
            let err = auth
                .authenticate(header, &activity("msteams"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Unauthenticated { .. }), "{header:?}");
        }
        keys.metadata.assert_async().await;
    }

    #[tokio::test]
    async fn token_for_another_bot_is_rejected() {
        let mut claims = claims();
        claims["aud"] = "someone-else".into();
        assert!(matches!(
            rejection(claims, "msteams").await,
            Error::Unauthenticated { .. }
        ));
    }

    #[tokio::test]
    async fn foreign_issuer_is_rejected() {
        let mut claims = claims();
        claims["iss"] = "https://attacker.example".into();
        assert!(matches!(
            rejection(claims, "msteams").await,
            Error::Unauthenticated { .. }
        ));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let mut claims = claims();
        claims["exp"] = (now() - 3600).into();
        assert!(matches!(
            rejection(claims, "msteams").await,
            Error::Unauthenticated { .. }
        ));
    }

    #[tokio::test]
    async fn service_url_must_match_token_claim() {
        let mut claims = claims();
        claims["serviceurl"] = "https://attacker.example/".into();
        let err = rejection(claims, "msteams").await;
        assert!(err.to_string().contains("serviceUrl"));
    }

    #[tokio::test]
    async fn key_must_be_endorsed_for_channel() {
        let err = rejection(claims(), "slack").await;
        assert!(err.to_string().contains("endorsed"));
    }

    #[tokio::test]
    async fn unknown_key_id_is_rejected() {
        let keys = key_server().await;
        let err = authenticator(&keys)
            .authenticate(
                Some(bearer_with_kid(&claims(), "rotated-away").as_str()),
                &activity("msteams"),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rotated-away"));
    }

    #[tokio::test]
    async fn metadata_outage_is_not_an_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/openid")
            .with_status(503)
            .create_async()
            .await;
        let auth = ChannelAuthenticator::new(
            "app-1",
            format!("{}/openid", server.url()),
            reqwest::Client::new(),
        );
        let err = auth
            .authenticate(Some(bearer(&claims()).as_str()), &activity("msteams"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SigningKeys { .. }));
    }

    #[tokio::test]
    async fn emulator_mode_accepts_unsigned_requests() {
        let auth = ChannelAuthenticator::from_config(&BotConfig::default(), reqwest::Client::new());
        assert!(!auth.is_enabled());
        auth.authenticate(None, &activity("emulator")).await.unwrap();
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Token abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
