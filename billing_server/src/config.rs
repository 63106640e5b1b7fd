use std::{env, path::PathBuf};

use billing_common::is_currency_code;
use log::*;

const DEFAULT_BILLING_HOST: &str = "127.0.0.1";
const DEFAULT_BILLING_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/billing.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Bring the database schema up to date before serving requests.
    pub run_migrations: bool,
    /// The currency the PSP keeps its books in. Payment notifications cannot be applied without it.
    pub psp_accounting_currency: Option<String>,
    /// JSON file of CIDR networks and the payer locations they resolve to.
    pub geoip_db: Option<PathBuf>,
    /// JSON file with the payment system handler settings.
    pub payment_systems: Option<PathBuf>,
    /// If true, the X-Forwarded-For header will be used to determine the payer's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the payer's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BILLING_HOST.to_string(),
            port: DEFAULT_BILLING_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            run_migrations: true,
            psp_accounting_currency: None,
            geoip_db: None,
            payment_systems: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

fn flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(s) if default => &s != "0" && &s != "false",
        Ok(s) => &s == "1" || &s == "true",
        Err(_) => default,
    }
}

fn path(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|s| !s.trim().is_empty()).map(PathBuf::from)
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("BILLING_HOST").ok().unwrap_or_else(|| DEFAULT_BILLING_HOST.into());
        let port = env::var("BILLING_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for BILLING_PORT. {e} Using the default, {DEFAULT_BILLING_PORT}, \
                         instead."
                    );
                    DEFAULT_BILLING_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_BILLING_PORT);
        let database_url = env::var("BILLING_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ BILLING_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let run_migrations = flag("BILLING_RUN_MIGRATIONS", true);
        let psp_accounting_currency = env::var("BILLING_PSP_ACCOUNTING_CURRENCY")
            .ok()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| {
                let valid = is_currency_code(s);
                if !valid {
                    error!("🪛️ BILLING_PSP_ACCOUNTING_CURRENCY ({s}) is not an alpha-3 currency code. Ignoring it.");
                }
                valid
            });
        if psp_accounting_currency.is_none() {
            warn!(
                "🪛️ No PSP accounting currency is configured. Payment notifications will be refused until \
                 BILLING_PSP_ACCOUNTING_CURRENCY is set."
            );
        }
        let geoip_db = path("BILLING_GEOIP_DB");
        if geoip_db.is_none() {
            info!("🪛️ BILLING_GEOIP_DB is not set. Payers will only be located by an explicit region.");
        }
        let payment_systems = path("BILLING_PAYMENT_SYSTEMS");
        if payment_systems.is_none() {
            warn!("🪛️ BILLING_PAYMENT_SYSTEMS is not set. No payment system handler is configured.");
        }
        let use_x_forwarded_for = flag("BILLING_USE_X_FORWARDED_FOR", false);
        let use_forwarded = flag("BILLING_USE_FORWARDED", false);
        Self {
            host,
            port,
            database_url,
            run_migrations,
            psp_accounting_currency,
            geoip_db,
            payment_systems,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The part of the configuration that request handlers need. Paths and connection strings stay out of it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
