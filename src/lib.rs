//! # coordkv
//!
//! A thin, typed client façade over a coordination service (etcd v3):
//! - Hierarchical node CRUD with ancestor auto-creation
//! - Optimistic-concurrency updates via the service's write counter
//! - Guaranteed recursive delete
//! - Change-notification subscriptions (single node, immediate children)
//! - Bounded, polling connection startup with a process-wide shared client
//!
//! Session management, the wire protocol, retry-relevant transport
//! behavior, and watch delivery are delegated to `etcd-client`; this crate
//! owns only the façade semantics and the subscription plumbing.
//!
//! ## Usage
//!
//! ```no_run
//! use coordkv::{Config, CoordinationClient};
//!
//! # async fn demo() -> coordkv::Result<()> {
//! let config = Config::new("localhost", 2379, 30_000, 15_000);
//! let client = CoordinationClient::connect(config).await?;
//!
//! client.create("/registry/dictionary/a", b"payload").await?;
//! assert!(client.exists("/registry/dictionary/a").await?);
//!
//! let (payload, stat) = client.get_data("/registry/dictionary/a").await?;
//! client.update("/registry/dictionary/a", stat.version, b"payload-2").await?;
//!
//! client.remove("/registry/dictionary/a").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Watching for changes
//!
//! ```no_run
//! # async fn demo(client: &coordkv::CoordinationClient) -> coordkv::Result<()> {
//! let watcher = client
//!     .watch_node(
//!         "/registry/dictionary/a",
//!         Some(Box::new(|event| println!("{:?}", event))),
//!     )
//!     .await?;
//! // ... keep `watcher` alive for as long as notifications are wanted ...
//! if let Some(watcher) = watcher {
//!     watcher.close().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;

// Re-export commonly used types
pub use client::{
    ChildEvent, ChildrenCallback, ChildrenWatcher, ConnectionState, CoordinationClient, NodeCallback,
    NodeEvent, NodeStat, NodeWatcher,
};
pub use common::{Config, Error, Result};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
