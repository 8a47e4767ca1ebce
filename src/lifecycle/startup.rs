//! Startup orchestration.
//!
//! # Responsibilities
//! - Verify the key pair and decrypt login passwords
//! - Configure and verify upstream connections, warm the cache
//! - Bind the control surface, then start sessions and the health server
//!
//! # Design Decisions
//! - Fail fast: configuration, key, role and cache warm-up problems abort startup
//! - Sessions start after the control surface is bound

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::bridge::{BridgeEndpoint, PickupPolicy, UpstreamSession};
use crate::cache::ReferenceCache;
use crate::config::{BridgeConfig, LoginUser};
use crate::crypto::KeyPair;
use crate::error::{BridgeError, BridgeResult};
use crate::health::serve_health;
use crate::http::{AppState, HttpServer, SessionEntry, SiteUser};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::bind_first_free;
use crate::records::RecordSubmitter;
use crate::resilience::RetryPolicy;
use crate::upstream::ConnectionPool;

/// How long stopped tasks get to finish before they are aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A fully initialized bridge that is not serving yet.
pub struct Bridge {
    config: BridgeConfig,
    state: AppState,
    sessions: Vec<UpstreamSession>,
}

impl Bridge {
    /// Run every startup check and build the shared state.
    pub async fn prepare(config: BridgeConfig) -> BridgeResult<Self> {
        let keys = load_keys(&config)?;
        let users = if config.mock_mode {
            resolve_login_users(&config.mock_users, keys.as_ref())?
        } else {
            resolve_login_users(&config.login_users, keys.as_ref())?
        };

        let cache = ReferenceCache::new();
        let pool = if config.mock_mode {
            tracing::warn!("Mock mode enabled, no upstream server will be contacted");
            None
        } else {
            let pool = ConnectionPool::configure(&config.credentials(), RetryPolicy::from(&config.retries))?;
            pool.verify_role().await?;
            pool.warm_cache(&cache, config.cache.warm_days, config.cache.long_ttl())
                .await?;
            Some(pool)
        };

        let connection_count = pool.as_ref().map_or(0, ConnectionPool::len);
        let (endpoint, outbound) = BridgeEndpoint::new(connection_count, config.bridge.poll_timeout());
        let pickup = PickupPolicy {
            short: config.bridge.short_pickup(),
            long: config.bridge.long_pickup(),
        };

        let mut sessions = Vec::with_capacity(connection_count);
        let mut entries = Vec::with_capacity(connection_count);
        if let Some(pool) = &pool {
            for ((index, connection), outbound) in pool.connections().iter().enumerate().zip(outbound) {
                let session = UpstreamSession::new(index, connection.clone(), endpoint.handoff(), outbound, pickup);
                entries.push(SessionEntry {
                    location: connection.location().to_string(),
                    primary: index == pool.primary_index(),
                    state: session.state(),
                });
                sessions.push(session);
            }
        }

        let state = AppState {
            bridge: Arc::new(endpoint),
            records: RecordSubmitter::new(pool, cache.clone(), config.cache.long_ttl()),
            cache,
            cache_config: config.cache.clone(),
            users: Arc::new(users),
            sessions: Arc::new(entries),
        };

        Ok(Self {
            config,
            state,
            sessions,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The control-surface router over this bridge's state.
    pub fn router(&self) -> Router {
        HttpServer::new(self.state.clone(), self.config.listener.max_body_size).into_router()
    }

    /// Bind the control surface and start every background task.
    pub async fn start(self) -> BridgeResult<RunningBridge> {
        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();

        let listener = bind_first_free(&self.config.listener)
            .await
            .map_err(|e| BridgeError::Configuration(e.to_string()))?;
        let bound = listener
            .local_addr()
            .map_err(|e| BridgeError::Configuration(format!("unable to read bound address: {e}")))?;
        let address = if bound.ip().is_unspecified() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
        } else {
            bound
        };

        let server = HttpServer::new(self.state.clone(), self.config.listener.max_body_size);
        let server_shutdown = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.run(listener, server_shutdown).await {
                tracing::error!(error = %e, "Control surface failed");
            }
        }));

        for session in self.sessions {
            tasks.push(tokio::spawn(session.run(shutdown.subscribe())));
        }

        let mut health_address = None;
        if let Some(port) = self.config.health_check.port {
            let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
                .await
                .map_err(|e| BridgeError::Configuration(format!("unable to bind health port {port}: {e}")))?;
            health_address = listener.local_addr().ok();
            let health_shutdown = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = serve_health(listener, health_shutdown).await {
                    tracing::error!(error = %e, "Health server failed");
                }
            }));
        }

        Ok(RunningBridge {
            address,
            health_address,
            shutdown,
            tasks,
        })
    }
}

/// Handle to a serving bridge.
pub struct RunningBridge {
    address: SocketAddr,
    health_address: Option<SocketAddr>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningBridge {
    /// Address of the control surface.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Value for the collector's SCRAPER_ADDRESS.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn health_address(&self) -> Option<SocketAddr> {
        self.health_address
    }

    /// Stop every task, aborting the ones that outlive the grace period.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        for mut task in self.tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                tracing::warn!("Task did not stop in time, aborting it");
                task.abort();
            }
        }
        tracing::info!("Bridge stopped");
    }
}

fn load_keys(config: &BridgeConfig) -> BridgeResult<Option<KeyPair>> {
    match (&config.public_key, &config.private_key) {
        (Some(public), Some(private)) => KeyPair::load_and_verify(public, private)
            .map(Some)
            .map_err(|e| BridgeError::Configuration(e.to_string())),
        _ => Ok(None),
    }
}

fn resolve_login_users(users: &[LoginUser], keys: Option<&KeyPair>) -> BridgeResult<Vec<SiteUser>> {
    users
        .iter()
        .map(|user| {
            let password = match (&user.encrypted_password, keys) {
                (Some(encrypted), Some(keys)) => keys.decrypt_password(encrypted).map_err(|e| {
                    BridgeError::Configuration(format!("password of {}: {e}", user.username))
                })?,
                (Some(_), None) => {
                    return Err(BridgeError::Configuration(format!(
                        "password of {} is encrypted but no key pair is configured",
                        user.username
                    )))
                }
                (None, _) => user.password.clone(),
            };
            Ok(SiteUser {
                username: user.username.clone(),
                password,
            })
        })
        .collect()
}
