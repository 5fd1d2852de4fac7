//! Typed process configuration, loaded once from the environment (with an
//! optional `.env` file via [`dotenvy`]) and held for the life of the
//! process.

use std::sync::LazyLock;

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::constants::DEFAULT_API_PORT;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

pub async fn load() -> EnvResult<&'static Env> {
    ENV_VARS.get_or_try_init(|| async { Env::new() }).await
}

pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = load().await?;
    Ok(match var {
        Var::DatabaseUrl => &vars.database_url,
        Var::ServerApiPort => &vars.server_api_port,
        Var::JwtSecret => &vars.jwt_secret,
        Var::CorsAllowOrigins => &vars.cors_allow_origins,
        Var::ApiServiceName => &vars.api_service_name,
        Var::ApiTracerName => &vars.api_tracer_name,
    })
}

#[derive(Debug, Clone)]
pub struct Env {
    pub database_url: String,
    pub server_api_port: String,
    pub jwt_secret: String,
    pub cors_allow_origins: String,
    pub api_service_name: String,
    pub api_tracer_name: String,

    /// When unset, leaderboard snapshots are only traced instead of POSTed.
    pub leaderboard_webhook_url: Option<String>,
    /// When unset, telemetry stays on the local fmt subscriber.
    pub otel_exporter_otlp_endpoint: Option<String>,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        // A missing .env file is fine; the real environment may carry everything.
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_api_port: optional("SERVER_API_PORT")
                .unwrap_or_else(|| DEFAULT_API_PORT.to_string()),
            jwt_secret: required("JWT_SECRET")?,
            cors_allow_origins: optional("CORS_ALLOW_ORIGINS").unwrap_or_else(|| "*".into()),
            api_service_name: optional("API_SERVICE_NAME").unwrap_or_else(|| "tally-server".into()),
            api_tracer_name: optional("API_TRACER_NAME")
                .unwrap_or_else(|| "tally-server-api".into()),
            leaderboard_webhook_url: optional("LEADERBOARD_WEBHOOK_URL"),
            otel_exporter_otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

#[derive(Debug)]
pub enum Var {
    DatabaseUrl,
    ServerApiPort,
    JwtSecret,
    CorsAllowOrigins,
    ApiServiceName,
    ApiTracerName,
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

fn required(key: &'static str) -> EnvResult<String> {
    std::env::var(key).map_err(|_| EnvErr::MissingValue(key))
}

fn optional(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error("missing required environment variable '{0}'")]
    MissingValue(&'static str),
}
