use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables (or a `.env` file).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3001`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`).
    pub request_timeout_secs: u64,
    /// Codec executable (compress / `-d` decompress).
    pub compressor_path: PathBuf,
    /// Metrics executable comparing two WAV files.
    pub metrics_tool_path: PathBuf,
    /// Per-invocation subprocess timeout in seconds (default: `120`).
    pub tool_timeout_secs: u64,
    /// Maximum number of tool processes running at once (default: `1`).
    pub tool_concurrency: usize,
    /// Root for per-job working directories.
    pub scratch_dir: PathBuf,
    /// Directory served under `/uploads`.
    pub public_dir: PathBuf,
    /// Lifetime of served artifacts in seconds; `0` keeps them forever.
    pub artifact_ttl_secs: u64,
    /// Maximum request body size for uploads (default: 100 MiB).
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                     |
    /// |------------------------|-----------------------------|
    /// | `HOST`                 | `0.0.0.0`                   |
    /// | `PORT`                 | `3001`                      |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`     |
    /// | `REQUEST_TIMEOUT_SECS` | `300`                       |
    /// | `COMPRESSOR_PATH`      | `./bin/audio_compressor`    |
    /// | `METRICS_TOOL_PATH`    | `./bin/audio_metrics`       |
    /// | `TOOL_TIMEOUT_SECS`    | `120`                       |
    /// | `TOOL_CONCURRENCY`     | `1`                         |
    /// | `SCRATCH_DIR`          | `./data/scratch`            |
    /// | `PUBLIC_DIR`           | `./data/uploads`            |
    /// | `ARTIFACT_TTL_SECS`    | `3600`                      |
    /// | `MAX_UPLOAD_BYTES`     | `104857600`                 |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = parse_env("PORT", 3001);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let tool_concurrency: usize = parse_env("TOOL_CONCURRENCY", 1);
        assert!(tool_concurrency > 0, "TOOL_CONCURRENCY must be at least 1");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 300),
            compressor_path: path_env("COMPRESSOR_PATH", "./bin/audio_compressor"),
            metrics_tool_path: path_env("METRICS_TOOL_PATH", "./bin/audio_metrics"),
            tool_timeout_secs: parse_env("TOOL_TIMEOUT_SECS", 120),
            tool_concurrency,
            scratch_dir: path_env("SCRATCH_DIR", "./data/scratch"),
            public_dir: path_env("PUBLIC_DIR", "./data/uploads"),
            artifact_ttl_secs: parse_env("ARTIFACT_TTL_SECS", 3600),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 100 * 1024 * 1024),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// `None` when artifact eviction is disabled.
    pub fn artifact_ttl(&self) -> Option<Duration> {
        (self.artifact_ttl_secs > 0).then(|| Duration::from_secs(self.artifact_ttl_secs))
    }
}

/// Parse `key` or fall back to `default`. Panics on an unparsable value so
/// misconfiguration fails at startup.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

fn path_env(key: &str, default: &str) -> PathBuf {
    std::env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
