/// Which record store backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local maps; everything is lost on restart.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("unknown store backend '{}': expected 'postgres' or 'memory'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub store: StoreBackend,
    pub db_max_connections: u32,
    /// Origin of the web front end allowed by CORS (localhost is always allowed).
    pub allowed_origin: String,
    /// Maximum accepted request body in bytes.
    pub body_limit_bytes: usize,
    /// Scope lists for passes minted at `serve` startup, one pass each.
    pub seed_passes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: "postgres://localhost/clubgate".into(),
            store: StoreBackend::Postgres,
            db_max_connections: 10,
            allowed_origin: "http://localhost:3000".into(),
            body_limit_bytes: 1024 * 1024,
            seed_passes: Vec::new(),
        }
    }
}

/// Load configuration from `.env` (if present) and the process environment.
pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary variable lookup.
/// Unparseable numbers fall back to defaults; an unknown backend is an error.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let store = match lookup("CLUBGATE_STORE") {
        Some(v) => v.parse()?,
        None => defaults.store,
    };

    Ok(Config {
        port: lookup("CLUBGATE_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port),
        database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
        store,
        db_max_connections: lookup("CLUBGATE_DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.db_max_connections),
        allowed_origin: lookup("CLUBGATE_ALLOWED_ORIGIN")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.allowed_origin),
        body_limit_bytes: lookup("CLUBGATE_BODY_LIMIT_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.body_limit_bytes),
        seed_passes: lookup("CLUBGATE_SEED_PASSES")
            .map(|v| parse_seed_passes(&v))
            .unwrap_or(defaults.seed_passes),
    })
}

/// `students:read,attendance:read;students:write` -> one entry per pass.
fn parse_seed_passes(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
