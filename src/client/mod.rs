//! Coordination client façade
//!
//! `CoordinationClient` wraps the delegated `etcd-client` handle behind the
//! node-oriented operations the rest of the system uses: existence checks,
//! create/update/create-or-update writes, reads with metadata, child
//! listing, guaranteed recursive delete, and change-notification
//! subscriptions for a single node or a node's immediate children.
//!
//! Session management, the wire protocol, and watch delivery all live in
//! the delegated client; this module owns the connection lifecycle, the
//! façade semantics, and the retry policy applied around delegated calls.

pub mod watch;

use crate::common::{parent_paths, validate_path, Config, Error, Result, RetryPolicy};
use etcd_client::{
    Client, Compare, CompareOp, ConnectOptions, DeleteOptions, GetOptions, KeyValue, Txn, TxnOp,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

pub use watch::{ChildEvent, ChildrenCallback, ChildrenWatcher, NodeCallback, NodeEvent, NodeWatcher};

/// Interval between connection probes during startup
const CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Minimum keep-alive probe interval handed to the delegated client
const MIN_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Connection lifecycle of the process-wide shared client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Uninitialized = 0,
    Connecting = 1,
    Started = 2,
}

impl ConnectionState {
    pub fn is_started(&self) -> bool {
        matches!(self, ConnectionState::Started)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Started,
            _ => ConnectionState::Uninitialized,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Uninitialized => write!(f, "uninitialized"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Started => write!(f, "started"),
        }
    }
}

/// Node metadata assigned by the coordination service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeStat {
    /// Per-node write counter: 1 on first write, incremented on every
    /// write. The optimistic-concurrency token for [`CoordinationClient::update`].
    pub version: i64,

    /// Cluster revision at which the node was created
    pub create_revision: i64,

    /// Cluster revision of the node's last modification
    pub mod_revision: i64,
}

pub(crate) fn stat_of(kv: &KeyValue) -> NodeStat {
    NodeStat {
        version: kv.version(),
        create_revision: kv.create_revision(),
        mod_revision: kv.mod_revision(),
    }
}

static SHARED: OnceCell<CoordinationClient> = OnceCell::const_new();
static SHARED_STATE: AtomicU8 = AtomicU8::new(ConnectionState::Uninitialized as u8);

/// Client façade over one coordination-service connection.
///
/// Cheap to clone; all operations take `&self` and may run from any number
/// of concurrent tasks.
#[derive(Clone)]
pub struct CoordinationClient {
    client: Client,
    config: Config,
    retry: RetryPolicy,
}

impl CoordinationClient {
    /// Connect to the ensemble, blocking until the connection is started.
    ///
    /// Probes the ensemble at a fixed 1-second interval, logging progress
    /// on each attempt. The wait is bounded by the configured connection
    /// timeout; on expiry the last probe failure is reported as
    /// [`Error::ConnectionFailed`].
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;

        let deadline = Instant::now() + config.connection_timeout();
        let mut attempt = 1u32;

        tracing::info!(endpoint = %config.endpoint(), "connecting to coordination service");
        let client = loop {
            tracing::info!("connection check {}", attempt);
            match Self::try_connect(&config).await {
                Ok(client) => break client,
                Err(e) if Instant::now() + CONNECT_POLL_INTERVAL < deadline => {
                    tracing::warn!("connection check {} failed: {}", attempt, e);
                    tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(Error::ConnectionFailed(format!(
                        "{} not reachable within {:?}: {}",
                        config.endpoint(),
                        config.connection_timeout(),
                        e
                    )));
                }
            }
        };
        tracing::info!(endpoint = %config.endpoint(), "coordination service connected");

        Ok(Self {
            client,
            config,
            retry: RetryPolicy::default(),
        })
    }

    /// Open the delegated client and probe ensemble status once.
    async fn try_connect(config: &Config) -> Result<Client> {
        let keep_alive_interval = (config.session_timeout() / 3).max(MIN_KEEP_ALIVE_INTERVAL);
        let options = ConnectOptions::new()
            .with_connect_timeout(config.connection_timeout())
            .with_keep_alive(keep_alive_interval, config.session_timeout())
            .with_keep_alive_while_idle(true);

        let mut client = Client::connect([config.endpoint()], Some(options)).await?;
        client.status().await?;
        Ok(client)
    }

    /// Process-wide shared client, initialized exactly once.
    ///
    /// Concurrent first callers all wait on the same initialization; a
    /// failed initialization leaves the slot empty so a later call can try
    /// again.
    pub async fn shared(config: &Config) -> Result<&'static CoordinationClient> {
        let client = SHARED
            .get_or_try_init(|| async {
                SHARED_STATE.store(ConnectionState::Connecting as u8, Ordering::SeqCst);
                let connected = Self::connect(config.clone()).await;
                let state = match &connected {
                    Ok(_) => ConnectionState::Started,
                    Err(_) => ConnectionState::Uninitialized,
                };
                SHARED_STATE.store(state as u8, Ordering::SeqCst);
                connected
            })
            .await?;
        Ok(client)
    }

    /// Lifecycle state of the shared client.
    pub fn shared_state() -> ConnectionState {
        ConnectionState::from_u8(SHARED_STATE.load(Ordering::SeqCst))
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Escape hatch: a handle on the delegated client, for operations the
    /// façade does not cover.
    pub fn raw(&self) -> Client {
        self.client.clone()
    }

    /// Does a node exist at `path`?
    ///
    /// Reports `false` for never-created and deleted nodes alike.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        validate_path(path)?;
        self.retry
            .run("exists", || {
                let mut kv = self.client.clone();
                let path = path.to_string();
                async move {
                    let resp = kv
                        .get(path, Some(GetOptions::new().with_count_only()))
                        .await?;
                    Ok(resp.count() > 0)
                }
            })
            .await
    }

    /// Create the node at `path` with the given payload.
    ///
    /// Missing ancestors are created with empty payloads. Fails with
    /// [`Error::NodeExists`] if the node is already present.
    pub async fn create(&self, path: &str, payload: &[u8]) -> Result<()> {
        validate_path(path)?;
        if self.exists(path).await? {
            return Err(Error::NodeExists(path.to_string()));
        }

        self.ensure_parents(path).await?;
        self.put_value(path, payload).await?;
        tracing::debug!(path, "node created");
        Ok(())
    }

    /// Overwrite the node at `path`, conditioned on its current write
    /// counter matching `version`.
    ///
    /// Fails with [`Error::NodeNotFound`] if the node is absent. The
    /// version check itself is delegated to the service as a conditional
    /// write; a stale version surfaces as [`Error::VersionConflict`].
    pub async fn update(&self, path: &str, version: i64, payload: &[u8]) -> Result<()> {
        validate_path(path)?;
        if !self.exists(path).await? {
            return Err(Error::NodeNotFound(path.to_string()));
        }

        let resp = self
            .retry
            .run("update", || {
                let mut kv = self.client.clone();
                let path = path.to_string();
                let value = payload.to_vec();
                async move {
                    let txn = Txn::new()
                        .when(vec![Compare::version(
                            path.as_str(),
                            CompareOp::Equal,
                            version,
                        )])
                        .and_then(vec![TxnOp::put(path, value, None)]);
                    Ok(kv.txn(txn).await?)
                }
            })
            .await?;

        if !resp.succeeded() {
            return Err(Error::VersionConflict {
                path: path.to_string(),
                expected: version,
            });
        }
        tracing::debug!(path, version, "node updated");
        Ok(())
    }

    /// Write the node at `path`, creating it (with any missing ancestors)
    /// if absent and overwriting it unconditionally if present.
    ///
    /// Never fails on existence either way; every call still advances the
    /// node's write counter.
    pub async fn create_or_update(&self, path: &str, payload: &[u8]) -> Result<()> {
        validate_path(path)?;
        if !self.exists(path).await? {
            self.ensure_parents(path).await?;
        }
        self.put_value(path, payload).await?;
        tracing::debug!(path, "node written");
        Ok(())
    }

    /// Read the node's payload and service-assigned metadata.
    pub async fn get_data(&self, path: &str) -> Result<(Vec<u8>, NodeStat)> {
        validate_path(path)?;
        let resp = self
            .retry
            .run("get_data", || {
                let mut kv = self.client.clone();
                let path = path.to_string();
                async move { Ok(kv.get(path, None).await?) }
            })
            .await?;

        match resp.kvs().first() {
            Some(kv) => Ok((kv.value().to_vec(), stat_of(kv))),
            None => Err(Error::NodeNotFound(path.to_string())),
        }
    }

    /// Names of the node's immediate children. Order is not meaningful.
    ///
    /// A leaf or absent node yields an empty list.
    pub async fn get_children(&self, path: &str) -> Result<Vec<String>> {
        validate_path(path)?;
        let resp = self
            .retry
            .run("get_children", || {
                let mut kv = self.client.clone();
                let prefix = format!("{}/", path);
                async move {
                    Ok(kv
                        .get(prefix, Some(GetOptions::new().with_prefix().with_keys_only()))
                        .await?)
                }
            })
            .await?;

        let mut children = Vec::new();
        for kv in resp.kvs() {
            if let Some(name) = crate::common::child_name(path, kv.key_str()?) {
                children.push(name.to_string());
            }
        }
        Ok(children)
    }

    /// Guaranteed delete of the node and its entire subtree.
    ///
    /// The node and all descendants are removed in one transaction,
    /// retried across transient connection loss until it takes effect.
    /// Idempotent: removing an absent node succeeds.
    pub async fn remove(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        self.retry
            .run("remove", || {
                let mut kv = self.client.clone();
                let path = path.to_string();
                async move {
                    let txn = Txn::new().and_then(vec![
                        TxnOp::delete(path.as_str(), None),
                        TxnOp::delete(
                            format!("{}/", path),
                            Some(DeleteOptions::new().with_prefix()),
                        ),
                    ]);
                    kv.txn(txn).await?;
                    Ok(())
                }
            })
            .await?;
        tracing::debug!(path, "node removed");
        Ok(())
    }

    /// Subscribe to create/update/delete of exactly one node.
    ///
    /// With `None` for the callback this is a no-op: no watch is
    /// registered and no handle is returned. Otherwise the returned
    /// [`NodeWatcher`] must be retained; dropping it stops delivery.
    pub async fn watch_node(
        &self,
        path: &str,
        callback: Option<NodeCallback>,
    ) -> Result<Option<NodeWatcher>> {
        let Some(callback) = callback else {
            return Ok(None);
        };
        validate_path(path)?;
        watch::subscribe_node(self.client.clone(), path, callback)
            .await
            .map(Some)
    }

    /// Subscribe to add/update/remove of the node's immediate children,
    /// payloads included.
    ///
    /// Same no-op contract for a `None` callback and same handle-retention
    /// caveat as [`CoordinationClient::watch_node`].
    pub async fn watch_children(
        &self,
        path: &str,
        callback: Option<ChildrenCallback>,
    ) -> Result<Option<ChildrenWatcher>> {
        let Some(callback) = callback else {
            return Ok(None);
        };
        validate_path(path)?;
        watch::subscribe_children(self.client.clone(), path, callback)
            .await
            .map(Some)
    }

    /// Create any missing ancestors of `path` with empty payloads.
    async fn ensure_parents(&self, path: &str) -> Result<()> {
        for parent in parent_paths(path) {
            if !self.exists(&parent).await? {
                self.put_value(&parent, &[]).await?;
            }
        }
        Ok(())
    }

    async fn put_value(&self, path: &str, value: &[u8]) -> Result<()> {
        self.retry
            .run("put", || {
                let mut kv = self.client.clone();
                let path = path.to_string();
                let value = value.to_vec();
                async move {
                    kv.put(path, value, None).await?;
                    Ok(())
                }
            })
            .await
    }
}

impl std::fmt::Debug for CoordinationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationClient")
            .field("endpoint", &self.config.endpoint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state() {
        assert!(ConnectionState::Started.is_started());
        assert!(!ConnectionState::Connecting.is_started());
        assert!(!ConnectionState::Uninitialized.is_started());

        assert_eq!(ConnectionState::from_u8(0), ConnectionState::Uninitialized);
        assert_eq!(ConnectionState::from_u8(1), ConnectionState::Connecting);
        assert_eq!(ConnectionState::from_u8(2), ConnectionState::Started);
        assert_eq!(ConnectionState::from_u8(99), ConnectionState::Uninitialized);

        assert_eq!(ConnectionState::Started.to_string(), "started");
    }

    #[test]
    fn test_shared_state_starts_uninitialized() {
        assert_eq!(
            CoordinationClient::shared_state(),
            ConnectionState::Uninitialized
        );
    }

    #[test]
    fn test_node_stat_serializes() {
        let stat = NodeStat {
            version: 3,
            create_revision: 10,
            mod_revision: 14,
        };
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["create_revision"], 10);
        assert_eq!(json["mod_revision"], 14);
    }
}
