use dotenv::dotenv;
use std::env;
use std::time::Duration;

const BIND_HOST: &str = "BIND_HOST";
const BIND_PORT: &str = "BIND_PORT";
const DATABASE_URL: &str = "DATABASE_URL";
const FINALIZATION_TIMER_SECS: &str = "FINALIZATION_TIMER_SECS";
const SUBSCRIBER_IDLE_TIMEOUT_SECS: &str = "SUBSCRIBER_IDLE_TIMEOUT_SECS";

const DEFAULT_BIND_HOST: &str = "127.0.0.1";
const DEFAULT_BIND_PORT: u16 = 8080;
const DEFAULT_FINALIZATION_TIMER_SECS: u64 = 30;
const DEFAULT_SUBSCRIBER_IDLE_TIMEOUT_SECS: u64 = 60;

#[derive(Clone)]
pub struct Config {
    pub bind_host: String,
    pub bind_port: u16,
    /// `None` means run against the in-memory reference store.
    pub database_url: Option<String>,
    pub finalization_timer: Duration,
    pub subscriber_idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Config {
        // Load .env file, if present, for local development.
        dotenv().ok();

        let bind_host = env::var(BIND_HOST).unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());
        let bind_port = env::var(BIND_PORT)
            .ok()
            .map(|v| {
                v.parse::<u16>()
                    .unwrap_or_else(|_| panic!("failed to parse {BIND_PORT}: {v}"))
            })
            .unwrap_or(DEFAULT_BIND_PORT);
        let database_url = env::var(DATABASE_URL).ok();
        let finalization_timer = env::var(FINALIZATION_TIMER_SECS)
            .ok()
            .map(|v| {
                v.parse::<u64>()
                    .unwrap_or_else(|_| panic!("failed to parse {FINALIZATION_TIMER_SECS}: {v}"))
            })
            .unwrap_or(DEFAULT_FINALIZATION_TIMER_SECS);
        let subscriber_idle_timeout = env::var(SUBSCRIBER_IDLE_TIMEOUT_SECS)
            .ok()
            .map(|v| {
                v.parse::<u64>().unwrap_or_else(|_| {
                    panic!("failed to parse {SUBSCRIBER_IDLE_TIMEOUT_SECS}: {v}")
                })
            })
            .unwrap_or(DEFAULT_SUBSCRIBER_IDLE_TIMEOUT_SECS);

        Config {
            bind_host,
            bind_port,
            database_url,
            finalization_timer: Duration::from_secs(finalization_timer),
            subscriber_idle_timeout: Duration::from_secs(subscriber_idle_timeout),
        }
    }
}
