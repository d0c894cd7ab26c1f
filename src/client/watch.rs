//! Change-notification subscriptions
//!
//! Each subscription owns the delegated watcher plus a background task
//! that drains the watch stream and invokes the caller's callback.
//! Callbacks run on that task, not on caller-controlled scheduling.
//! Dropping a handle stops delivery; `close` also cancels the watch on
//! the server side.

use crate::client::{stat_of, NodeStat};
use crate::common::{child_name, Result};
use etcd_client::{Client, EventType, WatchOptions, WatchStream, Watcher};
use tokio::task::JoinHandle;

/// Change to a single watched node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Created {
        path: String,
        payload: Vec<u8>,
        stat: NodeStat,
    },
    Updated {
        path: String,
        payload: Vec<u8>,
        stat: NodeStat,
    },
    Deleted {
        path: String,
    },
}

impl NodeEvent {
    pub fn path(&self) -> &str {
        match self {
            NodeEvent::Created { path, .. }
            | NodeEvent::Updated { path, .. }
            | NodeEvent::Deleted { path } => path,
        }
    }
}

/// Change to an immediate child of a watched node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEvent {
    Added { child: String, payload: Vec<u8> },
    Updated { child: String, payload: Vec<u8> },
    Removed { child: String },
}

impl ChildEvent {
    pub fn child(&self) -> &str {
        match self {
            ChildEvent::Added { child, .. }
            | ChildEvent::Updated { child, .. }
            | ChildEvent::Removed { child } => child,
        }
    }
}

pub type NodeCallback = Box<dyn FnMut(NodeEvent) + Send + 'static>;
pub type ChildrenCallback = Box<dyn FnMut(ChildEvent) + Send + 'static>;

/// Live subscription to a single node's changes.
///
/// Delivery stops when the handle is dropped; prefer [`NodeWatcher::close`]
/// to also cancel the watch on the server side.
pub struct NodeWatcher {
    watcher: Watcher,
    task: JoinHandle<()>,
}

impl NodeWatcher {
    pub async fn close(mut self) -> Result<()> {
        self.watcher.cancel().await?;
        self.task.abort();
        Ok(())
    }
}

impl Drop for NodeWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Live subscription to a node's immediate children.
pub struct ChildrenWatcher {
    watcher: Watcher,
    task: JoinHandle<()>,
}

impl ChildrenWatcher {
    pub async fn close(mut self) -> Result<()> {
        self.watcher.cancel().await?;
        self.task.abort();
        Ok(())
    }
}

impl Drop for ChildrenWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) async fn subscribe_node(
    mut client: Client,
    path: &str,
    mut callback: NodeCallback,
) -> Result<NodeWatcher> {
    let (watcher, stream) = client.watch(path, None).await?;
    tracing::debug!(path, "node watch registered");

    let path = path.to_string();
    let task = tokio::spawn(async move {
        drain_watch(&path, stream, |put, key, payload, stat| {
            callback(node_event(put, key, payload, stat));
        })
        .await;
    });

    Ok(NodeWatcher { watcher, task })
}

pub(crate) async fn subscribe_children(
    mut client: Client,
    path: &str,
    mut callback: ChildrenCallback,
) -> Result<ChildrenWatcher> {
    let prefix = format!("{}/", path);
    let (watcher, stream) = client
        .watch(prefix, Some(WatchOptions::new().with_prefix()))
        .await?;
    tracing::debug!(path, "children watch registered");

    let parent = path.to_string();
    let log_path = parent.clone();
    let task = tokio::spawn(async move {
        drain_watch(&log_path, stream, move |put, key, payload, stat| {
            if let Some(event) = child_event(put, &parent, &key, payload, stat.version) {
                callback(event);
            }
        })
        .await;
    });

    Ok(ChildrenWatcher { watcher, task })
}

/// Drain a watch stream, handing each event to `deliver` as
/// `(is_put, key, payload, stat)`.
async fn drain_watch<F>(path: &str, mut stream: WatchStream, mut deliver: F)
where
    F: FnMut(bool, String, Vec<u8>, NodeStat),
{
    loop {
        match stream.message().await {
            Ok(Some(resp)) => {
                if resp.canceled() {
                    tracing::debug!(path, "watch canceled");
                    break;
                }
                for event in resp.events() {
                    let Some(kv) = event.kv() else { continue };
                    let Ok(key) = kv.key_str() else {
                        tracing::warn!(path, "skipping event with non-UTF-8 key");
                        continue;
                    };
                    deliver(
                        event.event_type() == EventType::Put,
                        key.to_string(),
                        kv.value().to_vec(),
                        stat_of(kv),
                    );
                }
            }
            Ok(None) => {
                tracing::debug!(path, "watch stream ended");
                break;
            }
            Err(e) => {
                tracing::warn!(path, "watch stream error: {}", e);
                break;
            }
        }
    }
}

/// Classify a single-node event. First write means created; the service
/// resets the write counter on delete, so a later recreate is Created
/// again.
fn node_event(put: bool, path: String, payload: Vec<u8>, stat: NodeStat) -> NodeEvent {
    if !put {
        NodeEvent::Deleted { path }
    } else if stat.version == 1 {
        NodeEvent::Created {
            path,
            payload,
            stat,
        }
    } else {
        NodeEvent::Updated {
            path,
            payload,
            stat,
        }
    }
}

/// Classify a children-watch event, filtering out anything deeper than an
/// immediate child.
fn child_event(
    put: bool,
    parent: &str,
    key: &str,
    payload: Vec<u8>,
    version: i64,
) -> Option<ChildEvent> {
    let child = child_name(parent, key)?.to_string();
    Some(if !put {
        ChildEvent::Removed { child }
    } else if version == 1 {
        ChildEvent::Added { child, payload }
    } else {
        ChildEvent::Updated { child, payload }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(version: i64) -> NodeStat {
        NodeStat {
            version,
            create_revision: 7,
            mod_revision: 7 + version,
        }
    }

    #[test]
    fn test_node_event_classification() {
        let created = node_event(true, "/a".into(), b"v1".to_vec(), stat(1));
        assert!(matches!(created, NodeEvent::Created { .. }));
        assert_eq!(created.path(), "/a");

        let updated = node_event(true, "/a".into(), b"v2".to_vec(), stat(2));
        assert!(matches!(updated, NodeEvent::Updated { .. }));

        let deleted = node_event(false, "/a".into(), Vec::new(), stat(0));
        assert_eq!(deleted, NodeEvent::Deleted { path: "/a".into() });
    }

    #[test]
    fn test_child_event_classification() {
        let added = child_event(true, "/a", "/a/b", b"v".to_vec(), 1).unwrap();
        assert_eq!(
            added,
            ChildEvent::Added {
                child: "b".into(),
                payload: b"v".to_vec()
            }
        );

        let updated = child_event(true, "/a", "/a/b", b"v2".to_vec(), 3).unwrap();
        assert!(matches!(updated, ChildEvent::Updated { .. }));
        assert_eq!(updated.child(), "b");

        let removed = child_event(false, "/a", "/a/b", Vec::new(), 0).unwrap();
        assert_eq!(removed, ChildEvent::Removed { child: "b".into() });
    }

    #[test]
    fn test_child_event_filters_deep_descendants() {
        assert_eq!(child_event(true, "/a", "/a/b/c", Vec::new(), 1), None);
        assert_eq!(child_event(true, "/a", "/a", Vec::new(), 1), None);
        assert_eq!(child_event(true, "/a", "/other", Vec::new(), 1), None);
    }
}
