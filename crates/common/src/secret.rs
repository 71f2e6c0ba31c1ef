use secrecy::{ExposeSecret, Secret};

/// Placeholder written in place of secret values in logs and dumps.
pub const REDACTED: &str = "[REDACTED]";

// ── Serde helpers for Secret<String> ────────────────────────────────────────

/// Serialize a `Secret<String>` as `"[REDACTED]"`, or `""` when unset.
///
/// Config dumps (`nlrelay check`) go through this so a populated secret is
/// visible as present without leaking it.
pub fn serialize_redacted<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if is_blank(secret) {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str(REDACTED)
    }
}

/// Serialize an `Option<Secret<String>>` as `"[REDACTED]"` or `null`.
pub fn serialize_option_redacted<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) if !is_blank(s) => serializer.serialize_some(REDACTED),
        _ => serializer.serialize_none(),
    }
}

/// True when the secret is empty or only whitespace.
pub fn is_blank(secret: &Secret<String>) -> bool {
    secret.expose_secret().trim().is_empty()
}
