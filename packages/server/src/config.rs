use crate::models::{GeoBounds, Taxi};
use crate::telephony::{
    PhoneBook, TwilioConfig, DEFAULT_API_BASE, DEFAULT_DRIVER_NUMBER, DEFAULT_VOICE_SCRIPT_URL,
};
use crate::{AppError, Result};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub twilio: TwilioConfig,
    pub numbers: PhoneBook,
    pub tick: Duration,
    pub initial_taxi: Taxi,
    pub bounds: Option<GeoBounds>,
}

/// Loads `.env` if present, then reads the process environment.
pub fn load_config() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    let config = from_lookup(|key| env::var(key).ok())?;

    info!(
        bind_addr = %config.bind_addr,
        database_url = %config.database_url,
        tick = ?config.tick,
        bounded = config.bounds.is_some(),
        "configuration loaded"
    );
    Ok(config)
}

/// Builds the configuration from any key lookup, so tests need not touch the
/// process environment.
pub fn from_lookup<F>(lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let vars = Vars(lookup);
    let defaults = Taxi::default();

    Ok(AppConfig {
        bind_addr: vars.parsed("BIND_ADDR", "0.0.0.0:5000")?,
        database_url: vars.or("DATABASE_URL", "sqlite://taxi.db"),
        db_max_connections: vars.parsed("DB_MAX_CONNECTIONS", "5")?,
        twilio: TwilioConfig {
            account_sid: vars.required("TWILIO_ACCOUNT_SID")?,
            auth_token: vars.required("TWILIO_AUTH_TOKEN")?,
            api_base: vars.or("TWILIO_API_BASE", DEFAULT_API_BASE),
            timeout: vars.positive_secs("TWILIO_TIMEOUT_SECS", "30")?,
        },
        numbers: PhoneBook {
            from: vars.required("TWILIO_PHONE_NUMBER")?,
            driver: vars.or("DRIVER_PHONE_NUMBER", DEFAULT_DRIVER_NUMBER),
            operator: vars.required("YOUR_PHONE_NUMBER")?,
            voice_script_url: vars.or("VOICE_SCRIPT_URL", DEFAULT_VOICE_SCRIPT_URL),
        },
        tick: vars.positive_secs("LOCATION_TICK_SECS", "5")?,
        initial_taxi: Taxi {
            id: vars.or("TAXI_ID", &defaults.id),
            lat: vars.parsed("TAXI_LAT", &defaults.lat.to_string())?,
            lng: vars.parsed("TAXI_LNG", &defaults.lng.to_string())?,
            status: vars.or("TAXI_STATUS", &defaults.status),
        },
        bounds: vars
            .get("TAXI_BOUNDS")
            .map(|raw| raw.parse::<GeoBounds>().map_err(|e| AppError::invalid_env("TAXI_BOUNDS", e)))
            .transpose()?,
    })
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| AppError::MissingEnvVar(key.to_string()))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| {
            debug!("{key} not set, using default: {default}");
            default.to_string()
        })
    }

    fn parsed<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.or(key, default)
            .trim()
            .parse()
            .map_err(|e| AppError::invalid_env(key, e))
    }

    /// A whole number of seconds; zero is rejected because timers need a
    /// non-zero period.
    fn positive_secs(&self, key: &str, default: &str) -> Result<Duration> {
        match self.parsed::<u64>(key, default)? {
            0 => Err(AppError::invalid_env(key, "must be greater than zero")),
            secs => Ok(Duration::from_secs(secs)),
        }
    }
}
