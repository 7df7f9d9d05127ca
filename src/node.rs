//! The `Node` collaborator: raw subscription delivery and topic listing.
//!
//! The distilled spec treats this as an external interface
//! (`Options().Partition()`, `SubscribeRaw`, `TopicList`). SPEC_FULL.md §4.D/E
//! supplements it with a concrete [`UdpNode`] so the crate is runnable
//! end-to-end; the recorder itself only ever depends on the [`Node`] trait.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::types::MessageInfo;

/// Raw byte-level subscription callback.
pub type RawCallback = Arc<dyn Fn(&[u8], &MessageInfo) + Send + Sync>;

/// The transport node a [`crate::recorder::Recorder`] subscribes through.
///
/// Mirrors the external contract: `Options().Partition() -> String`,
/// `SubscribeRaw(topic, cb) -> bool`, `TopicList() -> Vec<String>`.
pub trait Node: Send + Sync {
    /// The partition this node is configured for.
    fn partition(&self) -> String;

    /// Subscribe to raw messages on `topic`. `cb` is invoked from whatever
    /// thread the node delivers messages on. Returns `false` on failure.
    fn subscribe_raw(&self, topic: &str, cb: RawCallback) -> bool;

    /// Currently known topics (e.g. ones locally advertised or observed).
    fn topic_list(&self) -> Vec<String>;
}

/// Minimal UDP-backed [`Node`].
///
/// Each `subscribe_raw` call binds a dedicated UDP socket on an ephemeral
/// port and spawns a background task (on a small dedicated runtime, so this
/// works even when the caller is not itself inside a tokio context) that
/// reads datagrams and invokes the callback. This is a same-host/same-subnet
/// oriented reference implementation, not a production transport — see
/// SPEC_FULL.md §4.D/E.
pub struct UdpNode {
    partition: String,
    known_topics: Mutex<HashMap<String, SocketAddr>>,
    runtime: Arc<tokio::runtime::Runtime>,
}

impl UdpNode {
    pub fn new(partition: impl Into<String>) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("failed to start node runtime");

        Self {
            partition: partition.into(),
            known_topics: Mutex::new(HashMap::new()),
            runtime: Arc::new(runtime),
        }
    }

    /// Register a topic as locally known, bound to the address subscribers
    /// should connect to (used by [`crate::discovery::UdpDiscovery`] when
    /// building the [`crate::packet::Publisher`] record it advertises).
    pub fn register_topic(&self, topic: impl Into<String>, addr: SocketAddr) {
        self.known_topics.lock().insert(topic.into(), addr);
    }
}

impl Node for UdpNode {
    fn partition(&self) -> String {
        self.partition.clone()
    }

    fn subscribe_raw(&self, topic: &str, cb: RawCallback) -> bool {
        let socket = match self.runtime.block_on(UdpSocket::bind("0.0.0.0:0")) {
            Ok(s) => s,
            Err(e) => {
                warn!(topic, error = %e, "failed to bind subscriber socket");
                return false;
            }
        };

        debug!(topic, local_addr = ?socket.local_addr().ok(), "subscribed to raw topic");

        let topic_owned = topic.to_string();
        self.runtime.spawn(async move {
            let mut buf = vec![0u8; 65_535];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((n, peer)) => {
                        trace!(topic = %topic_owned, bytes = n, %peer, "received raw message");
                        let info = MessageInfo {
                            topic: topic_owned.clone(),
                            type_name: "application/octet-stream".to_string(),
                        };
                        cb(&buf[..n], &info);
                    }
                    Err(e) => {
                        warn!(topic = %topic_owned, error = %e, "subscriber socket read failed");
                        break;
                    }
                }
            }
        });

        true
    }

    fn topic_list(&self) -> Vec<String> {
        self.known_topics.lock().keys().cloned().collect()
    }
}

/// An in-memory [`Node`] fake for deterministic tests. Advertised topics are
/// supplied up front; `subscribe_raw` always succeeds and simply records the
/// callback so tests can drive it directly with [`FakeNode::deliver`].
#[cfg(test)]
pub struct FakeNode {
    partition: String,
    topics: Mutex<Vec<String>>,
    subscriptions: Mutex<HashMap<String, RawCallback>>,
    pub subscribe_should_fail: Mutex<std::collections::HashSet<String>>,
}

#[cfg(test)]
impl FakeNode {
    pub fn new(partition: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            partition: partition.into(),
            topics: Mutex::new(topics),
            subscriptions: Mutex::new(HashMap::new()),
            subscribe_should_fail: Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn set_topics(&self, topics: Vec<String>) {
        *self.topics.lock() = topics;
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.lock().contains_key(topic)
    }

    /// Deliver a raw message to whatever callback is registered for `topic`,
    /// as the real node would from a subscriber thread.
    pub fn deliver(&self, topic: &str, bytes: &[u8]) {
        let cb = self.subscriptions.lock().get(topic).cloned();
        if let Some(cb) = cb {
            let info = MessageInfo {
                topic: topic.to_string(),
                type_name: "test".to_string(),
            };
            cb(bytes, &info);
        }
    }
}

#[cfg(test)]
impl Node for FakeNode {
    fn partition(&self) -> String {
        self.partition.clone()
    }

    fn subscribe_raw(&self, topic: &str, cb: RawCallback) -> bool {
        if self.subscribe_should_fail.lock().contains(topic) {
            return false;
        }
        self.subscriptions.lock().insert(topic.to_string(), cb);
        true
    }

    fn topic_list(&self) -> Vec<String> {
        self.topics.lock().clone()
    }
}
