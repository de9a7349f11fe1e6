use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

pub const DEFAULT_SESSION_TTL_SECS: u64 = 8 * 60 * 60;
pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;
pub const MIN_SESSION_SECRET_LEN: usize = 32;
const DEV_SESSION_SECRET: &str = "fleetadmin-dev-session-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" | "pg" => Ok(StorageBackend::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

#[derive(Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_secs: u64,
    pub cookie_secure: bool,
}

// The secret never reaches logs.
impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

impl SessionConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.secret == DEV_SESSION_SECRET
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: DEV_SESSION_SECRET.to_string(),
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            cookie_secure: false,
        }
    }
}

#[derive(Clone)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// Fleet admin configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct FleetAdminConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub session: SessionConfig,
    pub seed_admin: Option<SeedAdmin>,
}

#[derive(Debug, Default, Deserialize)]
struct FleetAdminConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    postgres: Option<PostgresOverride>,
    session_ttl_secs: Option<u64>,
    cookie_secure: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct PostgresOverride {
    url: Option<String>,
    max_connections: Option<u32>,
    acquire_timeout_ms: Option<u64>,
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value.parse().with_context(|| format!("parse {name}")),
        Err(_) => Ok(default),
    }
}

impl FleetAdminConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("FLEET_ADMIN_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse FLEET_ADMIN_BIND")?;
        let metrics_bind = std::env::var("FLEET_ADMIN_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9090".to_string())
            .parse()
            .with_context(|| "parse FLEET_ADMIN_METRICS_BIND")?;
        let storage = StorageBackend::parse(
            &std::env::var("FLEET_ADMIN_STORAGE").unwrap_or_else(|_| "memory".to_string()),
        )?;
        let postgres = match std::env::var("FLEET_ADMIN_PG_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_parse(
                    "FLEET_ADMIN_PG_MAX_CONNECTIONS",
                    DEFAULT_PG_MAX_CONNECTIONS,
                )?,
                acquire_timeout_ms: env_parse(
                    "FLEET_ADMIN_PG_ACQUIRE_TIMEOUT_MS",
                    DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
                )?,
            }),
            Err(_) => None,
        };
        let session = SessionConfig {
            secret: std::env::var("FLEET_ADMIN_SESSION_SECRET")
                .unwrap_or_else(|_| DEV_SESSION_SECRET.to_string()),
            ttl_secs: env_parse("FLEET_ADMIN_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            cookie_secure: env_parse("FLEET_ADMIN_COOKIE_SECURE", false)?,
        };
        let seed_admin = match (
            std::env::var("FLEET_ADMIN_SEED_ADMIN_EMAIL"),
            std::env::var("FLEET_ADMIN_SEED_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(SeedAdmin { email, password }),
            _ => None,
        };
        let config = Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            session,
            seed_admin,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("FLEET_ADMIN_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read FLEET_ADMIN_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: FleetAdminConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse fleet admin config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = StorageBackend::parse(&value)?;
        }
        if let Some(pg) = override_cfg.postgres {
            let current = self.postgres.take();
            let url = pg.url.or_else(|| current.as_ref().map(|cfg| cfg.url.clone()));
            self.postgres = url.map(|url| PostgresConfig {
                url,
                max_connections: pg
                    .max_connections
                    .or(current.as_ref().map(|cfg| cfg.max_connections))
                    .unwrap_or(DEFAULT_PG_MAX_CONNECTIONS),
                acquire_timeout_ms: pg
                    .acquire_timeout_ms
                    .or(current.as_ref().map(|cfg| cfg.acquire_timeout_ms))
                    .unwrap_or(DEFAULT_PG_ACQUIRE_TIMEOUT_MS),
            });
        }
        if let Some(value) = override_cfg.session_ttl_secs {
            self.session.ttl_secs = value;
        }
        if let Some(value) = override_cfg.cookie_secure {
            self.session.cookie_secure = value;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.storage == StorageBackend::Postgres && self.postgres.is_none() {
            bail!("FLEET_ADMIN_PG_URL is required when FLEET_ADMIN_STORAGE=postgres");
        }
        if self.session.ttl_secs == 0 {
            bail!("session ttl must be positive");
        }
        if self.session.ttl_secs > MAX_SESSION_TTL_SECS {
            bail!("session ttl must be at most {MAX_SESSION_TTL_SECS} seconds");
        }
        // The dev secret is public; durable deployments need their own key.
        if self.storage == StorageBackend::Postgres
            && (self.session.uses_dev_secret()
                || self.session.secret.len() < MIN_SESSION_SECRET_LEN)
        {
            bail!(
                "FLEET_ADMIN_SESSION_SECRET must be set to at least {MIN_SESSION_SECRET_LEN} bytes when FLEET_ADMIN_STORAGE=postgres"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 9] = [
        "FLEET_ADMIN_BIND",
        "FLEET_ADMIN_METRICS_BIND",
        "FLEET_ADMIN_STORAGE",
        "FLEET_ADMIN_PG_URL",
        "FLEET_ADMIN_SESSION_SECRET",
        "FLEET_ADMIN_SESSION_TTL_SECS",
        "FLEET_ADMIN_SEED_ADMIN_EMAIL",
        "FLEET_ADMIN_SEED_ADMIN_PASSWORD",
        "FLEET_ADMIN_CONFIG",
    ];

    const STRONG_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn clear_env() {
        for var in VARS {
            // SAFETY: env-mutating tests are serialized.
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn defaults_use_memory_storage() {
        clear_env();
        let config = FleetAdminConfig::from_env().expect("config");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.metrics_bind.port(), 9090);
        assert_eq!(config.session.ttl_secs, DEFAULT_SESSION_TTL_SECS);
        assert!(config.seed_admin.is_none());
    }

    #[test]
    #[serial]
    fn postgres_requires_url() {
        clear_env();
        unsafe { std::env::set_var("FLEET_ADMIN_STORAGE", "postgres") };
        let err = FleetAdminConfig::from_env().expect_err("missing url");
        assert!(err.to_string().contains("FLEET_ADMIN_PG_URL"));
        clear_env();
    }

    #[test]
    #[serial]
    fn seed_admin_needs_both_vars() {
        clear_env();
        unsafe { std::env::set_var("FLEET_ADMIN_SEED_ADMIN_EMAIL", "root@example.com") };
        assert!(FleetAdminConfig::from_env().expect("config").seed_admin.is_none());
        unsafe { std::env::set_var("FLEET_ADMIN_SEED_ADMIN_PASSWORD", "supersecret") };
        let seed = FleetAdminConfig::from_env()
            .expect("config")
            .seed_admin
            .expect("seed");
        assert_eq!(seed.email, "root@example.com");
        assert!(!format!("{seed:?}").contains("supersecret"));
        clear_env();
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        clear_env();
        unsafe { std::env::set_var("FLEET_ADMIN_SESSION_SECRET", STRONG_SECRET) };
        let mut config = FleetAdminConfig::from_env().expect("config");
        config
            .apply_yaml(
                "bind_addr: 127.0.0.1:9000\nstorage: postgres\npostgres:\n  url: postgres://localhost/fleet\nsession_ttl_secs: 60\n",
            )
            .expect("apply");
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.storage, StorageBackend::Postgres);
        let pg = config.postgres.expect("pg");
        assert_eq!(pg.max_connections, DEFAULT_PG_MAX_CONNECTIONS);
        assert_eq!(config.session.ttl_secs, 60);
        clear_env();
    }

    #[test]
    #[serial]
    fn postgres_rejects_dev_or_short_secret() {
        clear_env();
        unsafe {
            std::env::set_var("FLEET_ADMIN_STORAGE", "postgres");
            std::env::set_var("FLEET_ADMIN_PG_URL", "postgres://localhost/fleet");
        }
        let err = FleetAdminConfig::from_env().expect_err("dev secret");
        assert!(err.to_string().contains("FLEET_ADMIN_SESSION_SECRET"));

        unsafe { std::env::set_var("FLEET_ADMIN_SESSION_SECRET", "too-short") };
        assert!(FleetAdminConfig::from_env().is_err());

        unsafe { std::env::set_var("FLEET_ADMIN_SESSION_SECRET", STRONG_SECRET) };
        let config = FleetAdminConfig::from_env().expect("strong secret");
        assert!(!config.session.uses_dev_secret());
        clear_env();
    }

    #[test]
    #[serial]
    fn memory_backend_tolerates_dev_secret() {
        clear_env();
        let config = FleetAdminConfig::from_env().expect("config");
        assert!(config.session.uses_dev_secret());
    }

    #[test]
    #[serial]
    fn session_ttl_is_capped() {
        clear_env();
        unsafe { std::env::set_var("FLEET_ADMIN_SESSION_TTL_SECS", u64::MAX.to_string()) };
        let err = FleetAdminConfig::from_env().expect_err("ttl too large");
        assert!(err.to_string().contains("session ttl"));
        clear_env();
    }

    #[test]
    #[serial]
    fn bad_bind_addr_is_rejected() {
        clear_env();
        unsafe { std::env::set_var("FLEET_ADMIN_BIND", "not-an-addr") };
        assert!(FleetAdminConfig::from_env().is_err());
        clear_env();
    }
}
