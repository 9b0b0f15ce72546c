use std::env;

use chrono::Duration;
use ledger_common::{
    helpers::{parse_boolean_flag, parse_duration_secs},
    Secret,
    DEFAULT_CURRENCY_CODE,
};
use log::*;
use paystack_tools::PaystackConfig;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use wallet_engine::ApiKeyPolicy;

use crate::errors::ServerError;

const DEFAULT_WALLET_HOST: &str = "127.0.0.1";
const DEFAULT_WALLET_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/wallet_ledger.db";
const DEFAULT_SESSION_DURATION: Duration = Duration::hours(24);
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::minutes(5);
const DEFAULT_RECONCILE_MIN_AGE: Duration = Duration::minutes(10);
const DEFAULT_DEPOSIT_ABANDON_AFTER: Duration = Duration::hours(24);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Currency code of newly created wallets.
    pub currency: String,
    pub auth: AuthConfig,
    pub api_keys: ApiKeyPolicy,
    pub paystack: PaystackSettings,
    pub reconcile: ReconcileConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WALLET_HOST.to_string(),
            port: DEFAULT_WALLET_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            auth: AuthConfig::default(),
            api_keys: ApiKeyPolicy::default(),
            paystack: PaystackSettings::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("WALLET_HOST").ok().unwrap_or_else(|| DEFAULT_WALLET_HOST.into());
        let port = env::var("WALLET_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for WALLET_PORT. {e} Using the default, {DEFAULT_WALLET_PORT}, \
                         instead."
                    );
                    DEFAULT_WALLET_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_WALLET_PORT);
        let database_url = env::var("WALLET_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ WALLET_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let currency = env::var("WALLET_CURRENCY")
            .ok()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic()))
            .unwrap_or_else(|| {
                info!("🪛️ WALLET_CURRENCY is not set or invalid. New wallets will hold {DEFAULT_CURRENCY_CODE}");
                DEFAULT_CURRENCY_CODE.to_string()
            });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let api_keys = api_key_policy_from_env();
        let paystack = PaystackSettings::from_env_or_defaults();
        let reconcile = ReconcileConfig::from_env_or_defaults();
        Self { host, port, database_url, currency, auth, api_keys, paystack, reconcile }
    }
}

fn api_key_policy_from_env() -> ApiKeyPolicy {
    let default = ApiKeyPolicy::default();
    let prefix = env::var("WALLET_API_KEY_PREFIX").ok().filter(|s| !s.trim().is_empty()).unwrap_or(default.prefix);
    let max_active_keys = match env::var("WALLET_MAX_ACTIVE_KEYS").map(|s| s.parse::<usize>()) {
        Ok(Ok(n)) if n > 0 => n,
        Ok(_) => {
            warn!("🪛️ Invalid value for WALLET_MAX_ACTIVE_KEYS. Using {}", default.max_active_keys);
            default.max_active_keys
        },
        Err(_) => default.max_active_keys,
    };
    ApiKeyPolicy { prefix, max_active_keys }
}

/// Reads a `<n><unit>` duration from the environment, falling back to `default` with a log message.
fn duration_from_env(var: &str, default: Duration) -> Duration {
    match env::var(var) {
        Ok(s) => match parse_duration_secs(&s).and_then(|secs| i64::try_from(secs).ok()) {
            Some(secs) => Duration::seconds(secs),
            None => {
                warn!("🪛️ Invalid configuration value for {var}: {s}. Using {} seconds.", default.num_seconds());
                default
            },
        },
        Err(_) => {
            info!("🪛️ {var} is not set. Using the default value of {} seconds.", default.num_seconds());
            default
        },
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// HS256 key used to sign and verify session tokens.
    pub jwt_secret: Secret<String>,
    pub session_duration: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this since every session token is invalidated on restart. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret), session_duration: DEFAULT_SESSION_DURATION }
    }
}

impl AuthConfig {
    pub fn new(jwt_secret: &str, session_duration: Duration) -> Self {
        Self { jwt_secret: Secret::new(jwt_secret.to_string()), session_duration }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("WALLET_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [WALLET_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "WALLET_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        let session_duration = duration_from_env("WALLET_SESSION_DURATION", DEFAULT_SESSION_DURATION);
        Ok(Self::new(&secret, session_duration))
    }
}

//-------------------------------------------------  PaystackSettings  -------------------------------------------------
#[derive(Clone, Debug)]
pub struct PaystackSettings {
    pub api: PaystackConfig,
    /// Key for webhook signatures. Paystack signs with the account secret key, so this is usually the same value.
    pub webhook_secret: Secret<String>,
    /// If false, webhook signatures are not checked. **DANGER**
    pub hmac_checks: bool,
}

impl Default for PaystackSettings {
    fn default() -> Self {
        Self { api: PaystackConfig::default(), webhook_secret: Secret::default(), hmac_checks: true }
    }
}

impl PaystackSettings {
    pub fn from_env_or_defaults() -> Self {
        let api = PaystackConfig::new_from_env_or_default();
        let webhook_secret = env::var("WALLET_PAYSTACK_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(Secret::new)
            .unwrap_or_else(|| {
                debug!("🪛️ WALLET_PAYSTACK_WEBHOOK_SECRET is not set. Webhooks are checked with the secret key.");
                api.secret_key.clone()
            });
        let hmac_checks = parse_boolean_flag(env::var("WALLET_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Anyone can credit any wallet. 🚨️");
        }
        Self { api, webhook_secret, hmac_checks }
    }
}

//-------------------------------------------------  ReconcileConfig  --------------------------------------------------
#[derive(Clone, Copy, Debug)]
pub struct ReconcileConfig {
    pub interval: Duration,
    /// Pending deposits younger than this are left for the webhook.
    pub min_age: Duration,
    /// Pending deposits the gateway still does not confirm after this long are marked failed.
    pub abandon_after: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONCILE_INTERVAL,
            min_age: DEFAULT_RECONCILE_MIN_AGE,
            abandon_after: DEFAULT_DEPOSIT_ABANDON_AFTER,
        }
    }
}

impl ReconcileConfig {
    pub fn from_env_or_defaults() -> Self {
        let interval = duration_from_env("WALLET_RECONCILE_INTERVAL", DEFAULT_RECONCILE_INTERVAL);
        let interval = if interval <= Duration::zero() {
            warn!("🪛️ WALLET_RECONCILE_INTERVAL must be positive. Using the default.");
            DEFAULT_RECONCILE_INTERVAL
        } else {
            interval
        };
        let min_age = duration_from_env("WALLET_RECONCILE_MIN_AGE", DEFAULT_RECONCILE_MIN_AGE);
        let mut abandon_after = duration_from_env("WALLET_DEPOSIT_ABANDON_AFTER", DEFAULT_DEPOSIT_ABANDON_AFTER);
        if abandon_after < min_age {
            warn!("🪛️ WALLET_DEPOSIT_ABANDON_AFTER is shorter than WALLET_RECONCILE_MIN_AGE. Using the minimum age.");
            abandon_after = min_age;
        }
        Self { interval, min_age, abandon_after }
    }
}
