use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub auth: Auth,
    pub http: Http,
    pub log: Log,
    pub rate_limit: RateLimit,
    pub mysql: Option<Mysql>,
}

#[derive(Deserialize)]
pub struct Auth {
    pub backend: String, // "memory" or "mysql"
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub min_password_len: usize,
    pub secure_cookies: bool,
    /// Env var holding the signing key; wins over `signing_key`.
    pub signing_key_env: String,
    pub signing_key: Option<String>,
    pub fingerprint_key_env: String,
    pub fingerprint_key: Option<String>,
}

// Keys stay out of logs.
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("backend", &self.backend)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("min_password_len", &self.min_password_len)
            .field("secure_cookies", &self.secure_cookies)
            .field("signing_key_env", &self.signing_key_env)
            .field("fingerprint_key_env", &self.fingerprint_key_env)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    pub tls: bool,
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct RateLimit {
    pub backend: String, // "memory" or "redis"
    pub max_requests: u32,
    pub window_secs: u64,
    pub block_secs: u64,
    /// Counters idle for this many windows are dropped.
    pub idle_windows: u32,
    pub sweep_interval_secs: u64,
    /// Key on X-Forwarded-For instead of the peer address.
    pub trust_forwarded_for: bool,
    /// Proxies in front of the service; the key is the entry this many
    /// places from the right of X-Forwarded-For.
    #[serde(default = "default_trusted_proxy_hops")]
    pub trusted_proxy_hops: usize,
    pub redis_url: Option<String>,
    pub redis_prefix: String,
}

fn default_trusted_proxy_hops() -> usize {
    1
}

#[derive(Debug, Deserialize)]
pub struct Mysql {
    pub dsn: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    // VIDEOTUBE__RATE_LIMIT__MAX_REQUESTS=20 overrides rate_limit.max_requests
    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("VIDEOTUBE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_settings_parse() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();

        assert_eq!(settings.auth.backend, "memory");
        assert_eq!(settings.rate_limit.max_requests, 10);
        assert_eq!(settings.rate_limit.window_secs, 10);
        assert_eq!(settings.rate_limit.block_secs, 60);
        assert_eq!(settings.rate_limit.trusted_proxy_hops, 1);
    }

    #[test]
    fn missing_file_is_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
