//! Server configuration
//!
//! All settings are read from environment variables (a `.env` file is loaded first, if present). Missing or invalid
//! values are logged and replaced with a default. Secrets are kept in [`Secret`] wrappers so that they never end up in
//! log output.
use std::{env, time::Duration};

use log::*;
use order_engine::DEFAULT_TEST_ORDER_PREFIX;
use shop_common::{
    helpers::{parse_boolean_flag, parse_number},
    Secret,
};

const DEFAULT_SOL_HOST: &str = "127.0.0.1";
const DEFAULT_SOL_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
const DEFAULT_WEBHOOK_RATE_LIMIT: u32 = 100;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_INVOICE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The secret shared with the payment gateway. Notifications are signed with it.
    pub gateway_server_key: Secret<String>,
    /// Notifications for order ids starting with this prefix are gateway connectivity tests.
    pub test_order_prefix: String,
    /// The maximum number of payment notifications accepted from a single source address per minute.
    pub webhook_rate_limit: u32,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// How often the in-process expiry worker runs. `None` disables the worker. The sweep can still be triggered
    /// through the admin API.
    pub sweep_interval: Option<Duration>,
    /// Where to send invoices for paid orders. Invoices are not sent if this is not configured.
    pub invoice: Option<InvoiceConfig>,
    /// The key required in the `X-Admin-Key` header for admin routes. If empty, all admin requests are refused.
    pub admin_api_key: Secret<String>,
    /// How long the server waits for a client to send the request.
    pub request_timeout: Duration,
    /// How long a payment notification may take to process before the gateway is sent a 500 and left to retry.
    pub webhook_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct InvoiceConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SOL_HOST.to_string(),
            port: DEFAULT_SOL_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            gateway_server_key: Secret::default(),
            test_order_prefix: DEFAULT_TEST_ORDER_PREFIX.to_string(),
            webhook_rate_limit: DEFAULT_WEBHOOK_RATE_LIMIT,
            use_x_forwarded_for: false,
            use_forwarded: false,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
            invoice: None,
            admin_api_key: Secret::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SOL_HOST").ok().unwrap_or_else(|| DEFAULT_SOL_HOST.into());
        let port = env::var("SOL_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SOL_PORT. {e} Using the default, {DEFAULT_SOL_PORT}, instead."
                    );
                    DEFAULT_SOL_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SOL_PORT);
        let database_url = env::var("SOL_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SOL_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let gateway_server_key = env::var("SOL_GATEWAY_SERVER_KEY").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SOL_GATEWAY_SERVER_KEY is not set. Please set it to the server key of your payment gateway account. \
                 All payment notifications will be rejected until it is set."
            );
            String::default()
        });
        let test_order_prefix =
            env::var("SOL_TEST_ORDER_PREFIX").ok().unwrap_or_else(|| DEFAULT_TEST_ORDER_PREFIX.to_string());
        let webhook_rate_limit = parse_number::<u32>(env::var("SOL_WEBHOOK_RATE_LIMIT").ok())
            .unwrap_or_else(|e| {
                warn!("🪛️ Invalid configuration value for SOL_WEBHOOK_RATE_LIMIT. {e}");
                None
            })
            .unwrap_or(DEFAULT_WEBHOOK_RATE_LIMIT);
        let use_x_forwarded_for = parse_boolean_flag(env::var("SOL_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SOL_USE_FORWARDED").ok(), false);
        let sweep_interval = configure_sweep_interval();
        let invoice = configure_invoice_dispatch();
        let admin_api_key = env::var("SOL_ADMIN_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ SOL_ADMIN_API_KEY is not set. All requests to the admin API will be refused.");
            String::default()
        });
        let request_timeout = seconds_from_env("SOL_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT);
        let webhook_timeout = seconds_from_env("SOL_WEBHOOK_TIMEOUT", DEFAULT_WEBHOOK_TIMEOUT);
        Self {
            host,
            port,
            database_url,
            gateway_server_key: Secret::new(gateway_server_key),
            test_order_prefix,
            webhook_rate_limit,
            use_x_forwarded_for,
            use_forwarded,
            sweep_interval,
            invoice,
            admin_api_key: Secret::new(admin_api_key),
            request_timeout,
            webhook_timeout,
        }
    }
}

/// Reads a number of seconds from `var`, falling back to `default` if it is missing or invalid.
fn seconds_from_env(var: &str, default: Duration) -> Duration {
    match parse_number::<u64>(env::var(var).ok()) {
        Ok(Some(secs)) => Duration::from_secs(secs),
        Ok(None) => {
            info!("🪛️ {var} is not set. Using the default value of {}s.", default.as_secs());
            default
        },
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {var}. {e} Using the default of {}s.", default.as_secs());
            default
        },
    }
}

fn configure_sweep_interval() -> Option<Duration> {
    let interval = seconds_from_env("SOL_SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL);
    if interval.is_zero() {
        info!("🪛️ The in-process expiry worker is disabled. Use the /api/sweep route to expire unpaid orders.");
        None
    } else {
        Some(interval)
    }
}

fn configure_invoice_dispatch() -> Option<InvoiceConfig> {
    let url = env::var("SOL_INVOICE_URL").ok().filter(|s| !s.trim().is_empty());
    match url {
        Some(url) => {
            let timeout = seconds_from_env("SOL_INVOICE_TIMEOUT", DEFAULT_INVOICE_TIMEOUT);
            info!("🪛️ Invoices for paid orders will be sent to {url}");
            Some(InvoiceConfig { url, timeout })
        },
        None => {
            info!("🪛️ SOL_INVOICE_URL is not set. Invoices will not be dispatched.");
            None
        },
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub webhook_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self { use_x_forwarded_for: false, use_forwarded: false, webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT }
    }
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            webhook_timeout: config.webhook_timeout,
        }
    }
}
