use std::env;

const DEV_JWT_SECRET: &str = "agriconnect-development-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub advisor: AdvisorConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(5000);
        let environment = Environment::from_value(env::var("APP_ENV").ok().as_deref());

        let jwt_secret = match (env::var("JWT_SECRET"), environment) {
            (Ok(secret), _) if !secret.trim().is_empty() => secret,
            (_, Environment::Production) => {
                anyhow::bail!("JWT_SECRET must be set in production")
            }
            (_, Environment::Development) => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };
        let jwt_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);

        let advisor = AdvisorConfig {
            api_key: env::var("GROQ_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            api_url: env::var("GROQ_API_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            model: env::var("GROQ_MODEL").unwrap_or_else(|_| "llama-3.1-8b-instant".to_string()),
        };

        Ok(Self {
            port,
            database_url,
            host,
            environment,
            jwt_secret,
            jwt_ttl_hours,
            advisor,
        })
    }

    /// Configuration for tests and tools that never read the environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: String::new(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: Environment::Development,
            jwt_secret: jwt_secret.to_string(),
            jwt_ttl_hours: 24,
            advisor: AdvisorConfig {
                api_key: None,
                api_url: "http://127.0.0.1:0".to_string(),
                model: "test".to_string(),
            },
        }
    }
}
