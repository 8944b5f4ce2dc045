//! Persisted client configuration (`config.json`).
//!
//! The config file is produced once by the setup wizard and read-only
//! afterwards. Loading normalises every field: the poll interval is
//! clamped into its legal range, the network name is forced, and the
//! timezone string is parsed up front so rendering never fails later.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{DepinError, Result};

/// Lower bound for the poll interval, milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;

/// Upper bound for the poll interval, milliseconds.
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Default poll interval, milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// The only network this client speaks.
pub const NETWORK: &str = "xna";

// ---------------------------------------------------------------------------
// Timezone
// ---------------------------------------------------------------------------

/// Display timezone: UTC or a fixed decimal-hour offset.
///
/// The persisted form is `"UTC"` or a signed decimal such as `"+5.5"`
/// or `"-3"`. Offsets are bounded to ±14 hours (the widest offset in
/// actual use).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Timezone {
    Utc,
    /// Offset east of UTC, in seconds.
    Offset(i32),
}

impl Timezone {
    /// Parses the persisted timezone string.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("utc") || trimmed.is_empty() {
            return Ok(Self::Utc);
        }
        let hours: f64 = trimmed.parse().map_err(|_| DepinError::Config {
            reason: format!("invalid timezone '{s}': expected \"UTC\" or an hour offset like \"+5.5\""),
        })?;
        if !(-14.0..=14.0).contains(&hours) {
            return Err(DepinError::Config {
                reason: format!("timezone offset {hours} out of range [-14, +14]"),
            });
        }
        Ok(Self::Offset((hours * 3600.0) as i32))
    }

    /// Offset east of UTC in seconds (0 for UTC).
    pub fn offset_secs(&self) -> i32 {
        match self {
            Self::Utc => 0,
            Self::Offset(secs) => *secs,
        }
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self::Utc
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// The raw on-disk config record.
///
/// Field names follow the wire format of the setup wizard, hence the
/// camelCase renames.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Node RPC base URL.
    pub rpc_url: String,
    /// Optional basic-auth username (empty string allowed).
    #[serde(default)]
    pub rpc_username: Option<String>,
    /// Optional basic-auth password.
    #[serde(default)]
    pub rpc_password: Option<String>,
    /// Token (asset name) gating the messaging audience.
    pub token: String,
    /// Encrypted WIF record, `salt:iv:tag:ct` in lowercase hex.
    #[serde(rename = "privateKey")]
    pub private_key: String,
    /// Chain network name; forced to [`NETWORK`] at load.
    #[serde(default)]
    pub network: Option<String>,
    /// Poll interval in milliseconds; clamped at load.
    #[serde(default, rename = "pollInterval")]
    pub poll_interval: Option<i64>,
    /// `"UTC"` or a decimal hour offset.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Validated, normalised configuration used by the rest of the client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub rpc_username: Option<String>,
    pub rpc_password: Option<String>,
    pub token: String,
    /// Encrypted WIF record, still sealed.
    pub encrypted_private_key: String,
    pub network: String,
    pub poll_interval_ms: u64,
    pub timezone: Timezone,
}

impl ClientConfig {
    /// Loads and validates `config.json` from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DepinError::Config {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        let record: ConfigRecord =
            serde_json::from_str(&text).map_err(|e| DepinError::Config {
                reason: format!("invalid config JSON: {e}"),
            })?;
        Self::from_record(record)
    }

    /// Normalises a raw record into a usable config.
    pub fn from_record(record: ConfigRecord) -> Result<Self> {
        validate_rpc_url(&record.rpc_url)?;

        if record.token.trim().is_empty() {
            return Err(DepinError::Config {
                reason: "token must not be empty".into(),
            });
        }
        if record.private_key.trim().is_empty() {
            return Err(DepinError::Config {
                reason: "privateKey must not be empty".into(),
            });
        }

        let timezone = match record.timezone.as_deref() {
            None => Timezone::Utc,
            Some(s) => Timezone::parse(s)?,
        };

        Ok(Self {
            rpc_url: record.rpc_url,
            rpc_username: record.rpc_username,
            rpc_password: record.rpc_password,
            token: record.token,
            encrypted_private_key: record.private_key,
            network: NETWORK.to_owned(),
            poll_interval_ms: clamp_poll_interval(record.poll_interval),
            timezone,
        })
    }
}

/// Clamps the configured poll interval into
/// [[`MIN_POLL_INTERVAL_MS`], [`MAX_POLL_INTERVAL_MS`]].
///
/// Absent, zero, and negative values take the default before clamping.
pub fn clamp_poll_interval(configured: Option<i64>) -> u64 {
    let raw = match configured {
        Some(ms) if ms > 0 => ms as u64,
        _ => DEFAULT_POLL_INTERVAL_MS,
    };
    raw.clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
}

/// Minimal URL validation: scheme plus a non-empty host part.
///
/// The full parse happens inside the HTTP client; this check exists to
/// fail fast at startup with a config-shaped error instead of a
/// transport error on the first call.
fn validate_rpc_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| DepinError::Config {
            reason: format!("rpc_url '{url}' must start with http:// or https://"),
        })?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return Err(DepinError::Config {
            reason: format!("rpc_url '{url}' has no host"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ConfigRecord {
        ConfigRecord {
            rpc_url: "http://127.0.0.1:19001".into(),
            rpc_username: Some("user".into()),
            rpc_password: Some("pass".into()),
            token: "CHAT_TOKEN".into(),
            private_key: "aa:bb:cc:dd".into(),
            network: Some("mainnet".into()),
            poll_interval: Some(5_000),
            timezone: Some("UTC".into()),
        }
    }

    #[test]
    fn valid_record_normalises() -> crate::Result<()> {
        let cfg = ClientConfig::from_record(record())?;
        assert_eq!(cfg.poll_interval_ms, 5_000);
        assert_eq!(cfg.network, NETWORK);
        assert_eq!(cfg.timezone, Timezone::Utc);
        Ok(())
    }

    #[test]
    fn network_is_always_forced() -> crate::Result<()> {
        let mut rec = record();
        rec.network = Some("testnet".into());
        let cfg = ClientConfig::from_record(rec)?;
        assert_eq!(cfg.network, "xna");
        Ok(())
    }

    #[test]
    fn poll_interval_clamps_low_end() {
        assert_eq!(clamp_poll_interval(Some(0)), DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(clamp_poll_interval(Some(-5)), DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(clamp_poll_interval(Some(1)), MIN_POLL_INTERVAL_MS);
        assert_eq!(clamp_poll_interval(Some(999)), MIN_POLL_INTERVAL_MS);
        assert_eq!(clamp_poll_interval(Some(1_000)), 1_000);
    }

    #[test]
    fn poll_interval_clamps_high_end() {
        assert_eq!(clamp_poll_interval(Some(60_000)), 60_000);
        assert_eq!(clamp_poll_interval(Some(60_001)), MAX_POLL_INTERVAL_MS);
        assert_eq!(clamp_poll_interval(Some(i64::MAX)), MAX_POLL_INTERVAL_MS);
    }

    #[test]
    fn poll_interval_default_when_absent() {
        assert_eq!(clamp_poll_interval(None), DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn rejects_missing_scheme() {
        let mut rec = record();
        rec.rpc_url = "127.0.0.1:19001".into();
        assert!(ClientConfig::from_record(rec).is_err());
    }

    #[test]
    fn rejects_empty_host() {
        let mut rec = record();
        rec.rpc_url = "http:///rpc".into();
        assert!(ClientConfig::from_record(rec).is_err());
    }

    #[test]
    fn rejects_empty_token() {
        let mut rec = record();
        rec.token = "  ".into();
        assert!(ClientConfig::from_record(rec).is_err());
    }

    #[test]
    fn timezone_parses_half_hour_offsets() -> crate::Result<()> {
        let tz = Timezone::parse("+5.5")?;
        assert_eq!(tz.offset_secs(), 19_800);
        let tz = Timezone::parse("-3")?;
        assert_eq!(tz.offset_secs(), -10_800);
        Ok(())
    }

    #[test]
    fn timezone_rejects_out_of_range() {
        assert!(Timezone::parse("+15").is_err());
        assert!(Timezone::parse("garbage").is_err());
    }

    #[test]
    fn config_record_uses_wire_field_names() -> std::result::Result<(), serde_json::Error> {
        let json = r#"{
            "rpc_url": "http://localhost:19001",
            "token": "CHAT_TOKEN",
            "privateKey": "00:11:22:33",
            "pollInterval": 2000,
            "timezone": "+1"
        }"#;
        let rec: ConfigRecord = serde_json::from_str(json)?;
        assert_eq!(rec.private_key, "00:11:22:33");
        assert_eq!(rec.poll_interval, Some(2000));
        Ok(())
    }
}
