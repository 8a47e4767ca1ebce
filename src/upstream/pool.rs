//! Upstream connection pool.
//!
//! # Responsibilities
//! - Build one ServerConnection per configured server
//! - Enforce the primary designation (exactly one with 2+ servers)
//! - Fan records out to every server, primary result authoritative
//! - Verify API key roles and warm the reference cache at startup

use std::time::Duration;

use futures_util::future::join_all;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::ReferenceCache;
use crate::error::{BridgeError, BridgeResult};
use crate::resilience::RetryPolicy;
use crate::upstream::connection::{Credentials, ServerConnection};
use crate::upstream::types::{scanned_references_path, ApiKeyInfo, ApiRole, HEALTH_PATH, KEY_INFO_PATH};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-connection results of a fan-out call.
#[derive(Debug)]
pub struct FanoutResults<T> {
    primary: usize,
    results: Vec<T>,
}

impl<T> FanoutResults<T> {
    /// The primary server's result.
    pub fn authoritative(&self) -> &T {
        &self.results[self.primary]
    }

    /// Every result, in connection order.
    pub fn results(&self) -> &[T] {
        &self.results
    }
}

/// All configured upstream servers.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    connections: Vec<ServerConnection>,
    primary: usize,
}

impl ConnectionPool {
    /// Validate `credentials` and build the pool.
    pub fn configure(credentials: &[Credentials], retry: RetryPolicy) -> BridgeResult<Self> {
        if credentials.is_empty() {
            return Err(BridgeError::Configuration(
                "at least one server connection is required".into(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::Configuration(format!("unable to build http client: {e}")))?;

        let mut connections = Vec::with_capacity(credentials.len());
        let mut primary = None;
        for (idx, entry) in credentials.iter().enumerate() {
            connections.push(ServerConnection::from_credentials(entry, client.clone(), retry)?);
            if entry.primary {
                if primary.is_some() {
                    return Err(BridgeError::Configuration(
                        "only one connection can be marked as primary".into(),
                    ));
                }
                primary = Some(idx);
            }
        }

        let primary = match (connections.len(), primary) {
            (1, _) => 0,
            (_, Some(idx)) => idx,
            (_, None) => {
                return Err(BridgeError::Configuration(
                    "when defining multiple connections, one must be set as primary".into(),
                ))
            }
        };

        tracing::info!(
            connections = connections.len(),
            primary = %connections[primary].location(),
            "Configured upstream connections"
        );

        Ok(Self { connections, primary })
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn primary_index(&self) -> usize {
        self.primary
    }

    pub fn primary(&self) -> &ServerConnection {
        &self.connections[self.primary]
    }

    pub fn connections(&self) -> &[ServerConnection] {
        &self.connections
    }

    /// POST `body` to `path` on every connection concurrently.
    ///
    /// Fails as soon as any connection fails, after all requests settled.
    pub async fn fanout_post<B, T>(&self, path: &str, body: &B) -> BridgeResult<FanoutResults<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let encoded = serde_json::to_vec(body)
            .map_err(|e| BridgeError::InvalidInput(format!("unable to encode request body: {e}")))?;

        let outcomes = join_all(
            self.connections
                .iter()
                .map(|conn| conn.post_encoded::<T>(path, encoded.clone())),
        )
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => {
                    tracing::warn!(
                        connection = idx,
                        primary = idx == self.primary,
                        location = %self.connections[idx].location(),
                        error = %e,
                        "Fan-out request failed"
                    );
                    return Err(e);
                }
            }
        }

        Ok(FanoutResults {
            primary: self.primary,
            results,
        })
    }

    /// Check that every server is reachable and every key has the scraper role.
    pub async fn verify_role(&self) -> BridgeResult<()> {
        for (idx, conn) in self.connections.iter().enumerate() {
            conn.check(HEALTH_PATH).await?;

            let info: ApiKeyInfo = conn.get(KEY_INFO_PATH).await?;
            if !info.has_role(ApiRole::SCRAPER) {
                return Err(BridgeError::Configuration(format!(
                    "api key for {} does not have the scraper role (nr {})",
                    conn.location(),
                    ApiRole::SCRAPER
                )));
            }
            tracing::debug!(connection = idx, location = %conn.location(), "Upstream key verified");
        }
        Ok(())
    }

    /// Cache every reference the primary scanned during the last `days` days.
    pub async fn warm_cache(&self, cache: &ReferenceCache, days: u32, ttl: Duration) -> BridgeResult<usize> {
        let references: Option<Vec<String>> = self.primary().get(&scanned_references_path(days)).await?;
        let references = references.unwrap_or_default();
        for reference in &references {
            cache.put(reference.as_str(), ttl);
        }
        tracing::info!(count = references.len(), days, "Warmed reference cache from primary");
        Ok(references.len())
    }
}
