use std::{env, str::FromStr};

use fulfillment_engine::FulfillmentSettings;
use log::*;
use market_common::{helpers::parse_boolean_flag, Secret};

use crate::integrations::{expo::DEFAULT_EXPO_PUSH_URL, locationiq::DEFAULT_LOCATIONIQ_URL};

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8370;
const DEFAULT_WEBHOOK_HMAC_HEADER: &str = "X-Callback-Signature";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub webhook: WebhookConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub settings: FulfillmentSettings,
    pub push: PushConfig,
    pub routing: RoutingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            webhook: WebhookConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            settings: FulfillmentSettings::default(),
            push: PushConfig::default(),
            routing: RoutingConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the marketplace database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("MKT_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MKT_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            auth: AuthConfig::from_env_or_default(),
            webhook: WebhookConfig::from_env_or_default(),
            use_x_forwarded_for,
            use_forwarded,
            settings: settings_from_env(),
            push: PushConfig::from_env_or_default(),
            routing: RoutingConfig::from_env_or_default(),
        }
    }
}

fn settings_from_env() -> FulfillmentSettings {
    let defaults = FulfillmentSettings::default();
    FulfillmentSettings {
        shipping_cost: parse_env_or("MKT_SHIPPING_COST", defaults.shipping_cost),
        max_active_deliveries: parse_env_or("MKT_MAX_ACTIVE_DELIVERIES", defaults.max_active_deliveries),
        min_withdrawal: parse_env_or("MKT_MIN_WITHDRAWAL", defaults.min_withdrawal),
    }
}

/// Reads and parses `var`, logging and falling back to `default` when it is missing or invalid.
fn parse_env_or<T>(var: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {var}. {e}. Using the default value of {default}.");
            default
        }),
        Err(_) => {
            info!("🪛️ {var} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
/// Requests to `/api` carry the caller's identity in the `x-actor-id` and `x-actor-role` headers, put there by the
/// authentication service that fronts this server. `x-actor-signature` is a base64 HMAC-SHA256 of `"{id}:{role}"`
/// under the shared identity secret.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub identity_secret: Secret<String>,
    /// If false, identity headers are trusted without checking the signature. **DANGER**
    pub identity_checks: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { identity_secret: Secret::default(), identity_checks: true }
    }
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        let identity_secret = env::var("MKT_IDENTITY_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ MKT_IDENTITY_SECRET is not set. Please set it to the key shared with the authentication service."
            );
            String::default()
        });
        let identity_checks = parse_boolean_flag(env::var("MKT_IDENTITY_CHECKS").ok(), true);
        if !identity_checks {
            warn!(
                "🚨️🚨️🚨️ Identity signature checks are disabled. Anyone can act as any user. DO NOT run production \
                 like this. 🚨️🚨️🚨️"
            );
        }
        Self { identity_secret: Secret::new(identity_secret), identity_checks }
    }
}

//-------------------------------------------------  WebhookConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The header the payment gateway puts the body signature in
    pub hmac_header: String,
    pub hmac_secret: Secret<String>,
    pub hmac_checks: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { hmac_header: DEFAULT_WEBHOOK_HMAC_HEADER.to_string(), hmac_secret: Secret::default(), hmac_checks: true }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_header = env::var("MKT_WEBHOOK_HMAC_HEADER").ok().unwrap_or_else(|| {
            info!("🪛️ MKT_WEBHOOK_HMAC_HEADER is not set. Using {DEFAULT_WEBHOOK_HMAC_HEADER}.");
            DEFAULT_WEBHOOK_HMAC_HEADER.to_string()
        });
        let hmac_secret = env::var("MKT_WEBHOOK_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_WEBHOOK_HMAC_SECRET is not set. Please set it to the payment gateway's signing key.");
            String::default()
        });
        let hmac_checks = parse_boolean_flag(env::var("MKT_WEBHOOK_HMAC_CHECKS").ok(), true);
        Self { hmac_header, hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}

//-------------------------------------------------  PushConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct PushConfig {
    pub enabled: bool,
    pub endpoint: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { enabled: false, endpoint: DEFAULT_EXPO_PUSH_URL.to_string() }
    }
}

impl PushConfig {
    pub fn from_env_or_default() -> Self {
        let enabled = parse_boolean_flag(env::var("MKT_EXPO_ENABLED").ok(), false);
        let endpoint = env::var("MKT_EXPO_PUSH_URL").ok().unwrap_or_else(|| DEFAULT_EXPO_PUSH_URL.to_string());
        if !enabled {
            info!("🪛️ Push notifications are disabled. Set MKT_EXPO_ENABLED=1 to send them.");
        }
        Self { enabled, endpoint }
    }
}

//-------------------------------------------------  RoutingConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct RoutingConfig {
    pub api_key: Secret<String>,
    pub base_url: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { api_key: Secret::default(), base_url: DEFAULT_LOCATIONIQ_URL.to_string() }
    }
}

impl RoutingConfig {
    pub fn from_env_or_default() -> Self {
        let api_key = env::var("MKT_LOCATIONIQ_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_LOCATIONIQ_KEY is not set. Driver ETAs will not be available.");
            String::default()
        });
        let base_url = env::var("MKT_LOCATIONIQ_URL").ok().unwrap_or_else(|| DEFAULT_LOCATIONIQ_URL.to_string());
        Self { api_key: Secret::new(api_key), base_url }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
