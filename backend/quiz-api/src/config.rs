use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Mongo,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from: String,
    pub report_to: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub quiz_duration_minutes: i64,
    pub default_threshold: f64,
    pub public_url: String,
    pub bind_addr: String,
    /// JSON quiz seed loaded into the memory backend at startup.
    pub seed_file: Option<String>,
    pub smtp: Option<SmtpSettings>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let lookup = |key: &str, var: &str| settings.get_string(key).or_else(|_| env::var(var));

        let store_backend = lookup("store.backend", "STORE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .parse::<StoreBackend>()
            .map_err(config::ConfigError::Message)?;

        let mongo_uri = lookup("store.mongo_uri", "MONGO_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = lookup("store.mongo_database", "MONGO_DATABASE")
            .unwrap_or_else(|_| "screening".to_string());

        let jwt_secret = match lookup("auth.jwt_secret", "JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let quiz_duration_minutes = parse_or(
            lookup("quiz.duration_minutes", "QUIZ_DURATION_MINUTES").ok(),
            60,
        )?;
        let default_threshold = parse_or(
            lookup("quiz.default_threshold", "QUIZ_DEFAULT_THRESHOLD").ok(),
            -100.0,
        )?;

        let public_url = lookup("server.public_url", "PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:2020".to_string());
        let bind_addr =
            lookup("server.bind_addr", "BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:2020".to_string());
        let seed_file = lookup("store.seed_file", "SEED_FILE").ok();

        let smtp = match lookup("smtp.server", "SMTP_SERVER") {
            Ok(server) => Some(SmtpSettings {
                server,
                port: parse_or(lookup("smtp.port", "SMTP_PORT").ok(), 587)?,
                login: lookup("smtp.login", "SMTP_LOGIN").unwrap_or_default(),
                password: lookup("smtp.password", "SMTP_PASSWORD").unwrap_or_default(),
                from: lookup("smtp.from", "SMTP_FROM")
                    .unwrap_or_else(|_| "Screening Quiz <quiz@localhost>".to_string()),
                report_to: lookup("smtp.report_to", "SMTP_REPORT_TO")
                    .unwrap_or_else(|_| "hiring@localhost".to_string()),
                use_tls: parse_or(lookup("smtp.tls", "SMTP_TLS").ok(), true)?,
            }),
            Err(_) => None,
        };

        Ok(Config {
            store_backend,
            mongo_uri,
            mongo_database,
            jwt_secret,
            quiz_duration_minutes,
            default_threshold,
            public_url,
            bind_addr,
            seed_file,
            smtp,
        })
    }
}

fn parse_or<T>(raw: Option<String>, default: T) -> Result<T, config::ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|e| {
            config::ConfigError::Message(format!("invalid value {:?}: {}", value, e))
        }),
    }
}
