use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
}

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub cookie_policy: Arc<CookiePolicy>,
    /// Trusted proxy hops when X-Forwarded-For keys the rate limiter.
    pub forwarded_for_hops: Option<usize>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    pool: Option<Pool<MySql>>,
}

/// Read a secret from `env_name`, falling back to the inline value from the
/// settings file. A key is never generated implicitly.
fn load_secret(env_name: &str, inline: Option<&str>, what: &str) -> anyhow::Result<Vec<u8>> {
    let secret = match std::env::var(env_name) {
        Ok(value) => value,
        Err(_) => inline
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("{what} missing: set {env_name}"))?,
    };
    if secret.len() < 16 {
        return Err(anyhow!("{what} too short, need at least 16 bytes"));
    }
    Ok(secret.into_bytes())
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let signing_key = load_secret(
            &settings.auth.signing_key_env,
            settings.auth.signing_key.as_deref(),
            "signing key",
        )?;
        let fingerprint_key = load_secret(
            &settings.auth.fingerprint_key_env,
            settings.auth.fingerprint_key.as_deref(),
            "fingerprint key",
        )?;

        let mut pool = None;
        let account_store: Arc<dyn AccountStore> = match settings.auth.backend.as_str() {
            "memory" => Arc::new(InMemoryAccountStore::new()),
            "mysql" => {
                let dsn = &settings
                    .mysql
                    .as_ref()
                    .ok_or_else(|| anyhow!("auth backend mysql needs a [mysql] section"))?
                    .dsn;
                let mysql = Pool::<MySql>::connect(dsn).await?;
                pool = Some(mysql.clone());
                Arc::new(MySqlAccountStore::new(mysql))
            }
            other => return Err(anyhow!("Unknown auth backend: {}", other)),
        };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(
            JwtConfig {
                issuer: settings.auth.issuer.clone(),
                audience: settings.auth.audience.clone(),
                signing_key,
            },
            clock.clone(),
        ));
        let session_config = SessionConfig {
            access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
            min_password_len: settings.auth.min_password_len,
        };
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            account_store,
            credential_hasher,
            token_codec,
            RefreshFingerprinter::new(fingerprint_key),
            session_config,
        ));

        let rl = &settings.rate_limit;
        let policy = RateLimitPolicy {
            max_requests: rl.max_requests,
            window: chrono::Duration::seconds(i64::try_from(rl.window_secs)?),
            block: chrono::Duration::seconds(i64::try_from(rl.block_secs)?),
        };
        let idle_for = policy.window * i32::try_from(rl.idle_windows.max(1))?;
        let rate_limit_store: Arc<dyn RateLimitStore> = match rl.backend.as_str() {
            "memory" => Arc::new(MemoryRateLimitStore::new()),
            "redis" => {
                let url = rl
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("rate limit backend redis needs redis_url"))?;
                let redis_client = redis::Client::open(url)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisRateLimitStore::new(
                    redis_manager,
                    rl.redis_prefix.clone(),
                    idle_for,
                ))
            }
            other => return Err(anyhow!("Unknown rate limit backend: {}", other)),
        };
        let rate_limiter = Arc::new(RealRateLimiter::new(rate_limit_store, clock, policy));

        let cancel = CancellationToken::new();
        let sweeper_handle = rate_limiter.clone().spawn_sweeper(
            Duration::from_secs(rl.sweep_interval_secs.max(1)),
            idle_for,
            cancel.clone(),
        );

        info!(
            auth_backend = %settings.auth.backend,
            rate_limit_backend = %rl.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            rate_limiter,
            cookie_policy: Arc::new(CookiePolicy {
                secure: settings.auth.secure_cookies,
            }),
            forwarded_for_hops: rl
                .trust_forwarded_for
                .then_some(rl.trusted_proxy_hops.max(1)),
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.sweeper_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("rate limit sweeper dropped: {:?}", r);
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
