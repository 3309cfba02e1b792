//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `ATELIER_LEDGER_DIR` - Directory of the guest ledger (default: `.atelier/ledger`)
//! - `ATELIER_CATALOG_PATH` - JSON array of artworks used as the catalog
//! - `ATELIER_REMOTE_URL` - Base URL of the remote store; enables the REST mirror
//! - `ATELIER_REMOTE_API_KEY` - API key for the remote store (required with the URL)
//! - `ATELIER_REMOTE_TIMEOUT_SECS` - Remote request timeout (default: 10)
//! - `ATELIER_MAX_REPLAY_QUANTITY` - Upper bound on replayed units per line (default: 99)
//! - `ATELIER_LOGIN_POLICY` - `keep-local`, `adopt-remote` or `merge-into-remote`
//!   (default: `keep-local`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_LEDGER_DIR: &str = ".atelier/ledger";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Default upper bound on units replayed for a single ledger line.
pub const DEFAULT_MAX_REPLAY_QUANTITY: u32 = 99;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// What happens to the guest cart and wishlist when a visitor signs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginPolicy {
    /// Switch identity only; memory keeps the guest items and the remote is untouched.
    #[default]
    KeepLocal,
    /// Discard the guest items in memory and load the account's remote state.
    AdoptRemote,
    /// Push the guest items into the account, then load the merged remote state.
    MergeIntoRemote,
}

impl LoginPolicy {
    /// The configuration spelling of this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepLocal => "keep-local",
            Self::AdoptRemote => "adopt-remote",
            Self::MergeIntoRemote => "merge-into-remote",
        }
    }
}

impl fmt::Display for LoginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoginPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep-local" => Ok(Self::KeepLocal),
            "adopt-remote" => Ok(Self::AdoptRemote),
            "merge-into-remote" => Ok(Self::MergeIntoRemote),
            other => Err(format!(
                "unknown login policy '{other}' (expected keep-local, adopt-remote or merge-into-remote)"
            )),
        }
    }
}

/// Remote store connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Base URL; tables live under `<base>/rest/v1/`
    pub base_url: Url,
    /// API key sent as `apikey` and bearer token
    pub api_key: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Directory holding the guest ledger files
    pub ledger_dir: PathBuf,
    /// Optional JSON catalog file
    pub catalog_path: Option<PathBuf>,
    /// Remote store; `None` means signed-in mutations fail with `NotConfigured`
    pub remote: Option<RemoteConfig>,
    /// Upper bound on units replayed per ledger line during hydration
    pub max_replay_quantity: u32,
    /// Behaviour on sign-in
    pub login_policy: LoginPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            ledger_dir: PathBuf::from(DEFAULT_LEDGER_DIR),
            catalog_path: None,
            remote: None,
            max_replay_quantity: DEFAULT_MAX_REPLAY_QUANTITY,
            login_policy: LoginPolicy::default(),
            sentry_dsn: None,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed, if the remote URL is
    /// set without an API key, or if the key fails validation (placeholder
    /// detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`CartConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let ledger_dir = PathBuf::from(env.or_default("ATELIER_LEDGER_DIR", DEFAULT_LEDGER_DIR));
        let catalog_path = env.optional("ATELIER_CATALOG_PATH").map(PathBuf::from);

        let max_replay_quantity = env
            .or_default(
                "ATELIER_MAX_REPLAY_QUANTITY",
                &DEFAULT_MAX_REPLAY_QUANTITY.to_string(),
            )
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ATELIER_MAX_REPLAY_QUANTITY".to_string(), e.to_string())
            })?;
        if max_replay_quantity == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ATELIER_MAX_REPLAY_QUANTITY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let login_policy = env
            .or_default("ATELIER_LOGIN_POLICY", LoginPolicy::KeepLocal.as_str())
            .parse::<LoginPolicy>()
            .map_err(|e| ConfigError::InvalidEnvVar("ATELIER_LOGIN_POLICY".to_string(), e))?;

        let remote = RemoteConfig::from_env(&env)?;
        let sentry_dsn = env.optional("SENTRY_DSN");

        Ok(Self {
            ledger_dir,
            catalog_path,
            remote,
            max_replay_quantity,
            login_policy,
            sentry_dsn,
        })
    }
}

impl RemoteConfig {
    fn from_env<F>(env: &Env<F>) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(raw_url) = env.optional("ATELIER_REMOTE_URL") else {
            return Ok(None);
        };

        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("ATELIER_REMOTE_URL".to_string(), e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "ATELIER_REMOTE_URL".to_string(),
                format!("unsupported scheme '{}'", base_url.scheme()),
            ));
        }

        let api_key = env.validated_secret("ATELIER_REMOTE_API_KEY")?;

        let timeout_secs = env
            .or_default(
                "ATELIER_REMOTE_TIMEOUT_SECS",
                &DEFAULT_REMOTE_TIMEOUT_SECS.to_string(),
            )
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ATELIER_REMOTE_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Some(Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup with the usual required/optional/default accessors.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // key lengths are far below f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject placeholders and low-entropy keys.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the remote store."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const GOOD_KEY: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";

    fn load(vars: &[(&str, &str)]) -> Result<CartConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CartConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.ledger_dir, PathBuf::from(".atelier/ledger"));
        assert_eq!(config.max_replay_quantity, 99);
        assert_eq!(config.login_policy, LoginPolicy::KeepLocal);
        assert!(config.remote.is_none());
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_remote_config() {
        let config = load(&[
            ("ATELIER_REMOTE_URL", "https://db.atelier.test"),
            ("ATELIER_REMOTE_API_KEY", GOOD_KEY),
            ("ATELIER_REMOTE_TIMEOUT_SECS", "3"),
        ])
        .unwrap();

        let remote = config.remote.unwrap();
        assert_eq!(remote.base_url.host_str(), Some("db.atelier.test"));
        assert_eq!(remote.api_key.expose_secret(), GOOD_KEY);
        assert_eq!(remote.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_remote_url_without_key() {
        let err = load(&[("ATELIER_REMOTE_URL", "https://db.atelier.test")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "ATELIER_REMOTE_API_KEY"));
    }

    #[test]
    fn test_remote_url_must_be_http() {
        let err = load(&[
            ("ATELIER_REMOTE_URL", "ftp://db.atelier.test"),
            ("ATELIER_REMOTE_API_KEY", GOOD_KEY),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_placeholder_key_rejected() {
        let err = load(&[
            ("ATELIER_REMOTE_URL", "https://db.atelier.test"),
            ("ATELIER_REMOTE_API_KEY", "your-api-key-here"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_low_entropy_key_rejected() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_zero_replay_quantity_rejected() {
        let err = load(&[("ATELIER_MAX_REPLAY_QUANTITY", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_login_policy_parsing() {
        assert_eq!(
            "merge-into-remote".parse::<LoginPolicy>().unwrap(),
            LoginPolicy::MergeIntoRemote
        );
        assert_eq!(
            " Adopt-Remote ".parse::<LoginPolicy>().unwrap(),
            LoginPolicy::AdoptRemote
        );
        assert!("merge".parse::<LoginPolicy>().is_err());

        let config = load(&[("ATELIER_LOGIN_POLICY", "adopt-remote")]).unwrap();
        assert_eq!(config.login_policy, LoginPolicy::AdoptRemote);
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy(GOOD_KEY) > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = load(&[
            ("ATELIER_REMOTE_URL", "https://db.atelier.test"),
            ("ATELIER_REMOTE_API_KEY", GOOD_KEY),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(GOOD_KEY));
    }
}
