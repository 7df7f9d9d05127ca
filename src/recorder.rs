//! The `Recorder` engine: ties [`DiscoveryClient`], [`Node`], and [`Log`]
//! together into a topic-pattern-driven recording pipeline.
//!
//! See SPEC_FULL.md §4.G for the full operation contract and §9 for the
//! callback-lifetime design this module implements (Weak-reference
//! callbacks, resolving the half-destroyed-recorder race the distilled
//! spec leaves open).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::discovery::{DiscoveryClient, UdpDiscovery, DEFAULT_DISCOVERY_PORT};
use crate::error::{RecorderError, Result};
use crate::log::{FileLog, Log, LogFactory};
use crate::node::Node;
use crate::topic::decompose_fully_qualified_topic;
use crate::types::{MessageInfo, OpenMode};

fn default_log_factory() -> LogFactory {
    Arc::new(|| Box::new(FileLog::new()) as Box<dyn Log>)
}

/// Whether an advertised partition matches the node's own partition.
///
/// SPEC_FULL.md §4.G resolves the ambiguity over where to start comparing:
/// if the node's own partition string already begins with `/`, it is
/// compared against the advertised partition verbatim; otherwise the
/// advertised partition's leading `/` is stripped first. This lets a node
/// configured with either `"robot"` or `"/robot"` match advertisements for
/// `"/robot"`.
fn partitions_match(node_partition: &str, advertised_partition: &str) -> bool {
    let compared = if node_partition.starts_with('/') {
        advertised_partition
    } else {
        advertised_partition.strip_prefix('/').unwrap_or(advertised_partition)
    };
    compared == node_partition
}

/// Whether `pattern` matches the *entire* `topic` string, not merely a
/// substring of it.
///
/// SPEC_FULL.md §4.G step 4 calls for `pattern.full_match(topic_name)`;
/// `regex::Regex` has no such method, and `Regex::is_match` only checks for
/// a match anywhere in the haystack. A pattern like `"sensor"` must not
/// subscribe to `"my_sensor_data"` under this spec's semantics.
fn pattern_full_matches(pattern: &Regex, topic: &str) -> bool {
    pattern.find(topic).is_some_and(|m| m.start() == 0 && m.end() == topic.len())
}

#[derive(Default)]
struct TopicState {
    patterns: Vec<Regex>,
    already_subscribed: HashSet<String>,
}

/// The mutable state shared between a [`Recorder`] handle and the `Weak`
/// closures it hands to the discovery client and node.
struct RecorderInner {
    node: Arc<dyn Node>,
    log: Mutex<Option<Box<dyn Log>>>,
    log_factory: LogFactory,
    topic_state: Mutex<TopicState>,
    /// `SystemTime` (ns since the Unix epoch) sampled once at construction,
    /// paired with `mono_origin` below: `utc_ns(t) = wall_minus_mono_ns +
    /// mono_origin.elapsed_at(t)`. Never resampled, so message timestamps
    /// stay consistent even if the wall clock is later stepped.
    wall_minus_mono_ns: i64,
    mono_origin: Instant,
}

impl RecorderInner {
    fn now_utc_ns(&self) -> i64 {
        self.wall_minus_mono_ns + self.mono_origin.elapsed().as_nanos() as i64
    }

    /// Subscribe to `topic` via the node and, on success, record it in
    /// `state.already_subscribed`. Caller holds `topic_state` already locked.
    fn subscribe_and_record(self: &Arc<Self>, state: &mut TopicState, topic: &str) -> Result<()> {
        let weak = Arc::downgrade(self);
        let topic_owned = topic.to_string();
        let cb = Arc::new(move |data: &[u8], info: &MessageInfo| {
            if let Some(inner) = weak.upgrade() {
                inner.on_message_received(data, info);
            }
        });

        if self.node.subscribe_raw(topic, cb) {
            state.already_subscribed.insert(topic.to_string());
            Ok(())
        } else {
            warn!(topic = %topic_owned, "subscribe_raw failed");
            Err(RecorderError::FailedToSubscribe { topic: topic_owned })
        }
    }

    /// `add_topic(name)`: subscribe to exactly one bare topic name.
    ///
    /// Idempotency is the caller's responsibility at this entry point (per
    /// SPEC_FULL.md §4.G) — it does not itself check `already_subscribed`.
    /// [`Self::on_advertisement`] is the caller that enforces the
    /// at-most-once-per-topic invariant for advertisement-driven subscribes.
    fn add_topic(self: &Arc<Self>, topic: &str) -> Result<()> {
        let mut state = self.topic_state.lock();
        self.subscribe_and_record(&mut state, topic)
    }

    /// `add_topic(pattern)`: subscribe to every currently-known topic
    /// matching `pattern`, then retain the pattern for future advertisements.
    ///
    /// A topic already in `already_subscribed` is skipped rather than
    /// resubscribed, so repeated or overlapping patterns cannot violate the
    /// at-most-one-`subscribe_raw`-per-topic invariant.
    fn add_pattern(self: &Arc<Self>, pattern: Regex) -> Result<i64> {
        let topics = self.node.topic_list();
        let mut state = self.topic_state.lock();

        let mut subscribed = 0i64;
        for topic in &topics {
            if pattern_full_matches(&pattern, topic) && !state.already_subscribed.contains(topic) {
                self.subscribe_and_record(&mut state, topic)?;
                subscribed += 1;
            }
        }
        state.patterns.push(pattern);
        Ok(subscribed)
    }

    /// Handle one advertisement observed by the discovery client.
    fn on_advertisement(self: &Arc<Self>, publisher: crate::packet::Publisher) {
        let Some((advertised_partition, topic_name)) = decompose_fully_qualified_topic(&publisher.fqtn) else {
            warn!(fqtn = %publisher.fqtn, "dropping advertisement with malformed fqtn");
            return;
        };

        let node_partition = self.node.partition();
        if !partitions_match(&node_partition, advertised_partition) {
            return;
        }

        let mut state = self.topic_state.lock();
        if state.already_subscribed.contains(topic_name) {
            return;
        }

        // First-match short-circuit: at most one `subscribe_raw` call per
        // advertisement, regardless of how many registered patterns match.
        let matches_any_pattern = state.patterns.iter().any(|p| pattern_full_matches(p, topic_name));
        if matches_any_pattern {
            if let Err(e) = self.subscribe_and_record(&mut state, topic_name) {
                warn!(topic = topic_name, error = %e, "failed to subscribe from advertisement");
            }
        }
    }

    fn on_message_received(&self, data: &[u8], info: &MessageInfo) {
        let ts_utc_ns = self.now_utc_ns();
        let mut log = self.log.lock();
        let Some(log) = log.as_mut() else {
            return;
        };
        if !log.insert_message(ts_utc_ns, &info.topic, &info.type_name, data) {
            warn!(topic = %info.topic, "failed to insert message into log");
        }
    }

    fn start(&self, path: &Path) -> Result<()> {
        let mut log = self.log.lock();
        if log.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let mut new_log = (self.log_factory)();
        if new_log.open(path, OpenMode::Write) {
            info!(path = %path.display(), "recording started");
            *log = Some(new_log);
            Ok(())
        } else {
            Err(RecorderError::FailedToOpen { path: path.to_path_buf() })
        }
    }

    fn stop(&self) {
        if self.log.lock().take().is_some() {
            info!("recording stopped");
        }
    }
}

/// Matches topic names advertised on the network against a set of
/// caller-registered names and regex patterns, subscribing to each match
/// exactly once and appending every delivered message to a durable [`Log`].
///
/// Construction wires a [`DiscoveryClient`] callback and, for every
/// subscription, a [`Node`] raw-message callback — both closing over a
/// `Weak<RecorderInner>` rather than a strong `Arc`, so a `Recorder` dropped
/// while a callback is in flight is observed as "already gone" by that
/// callback instead of as partially-torn-down state (SPEC_FULL.md §9).
pub struct Recorder {
    inner: Arc<RecorderInner>,
    _discovery: Arc<dyn DiscoveryClient>,
}

impl Recorder {
    /// Build a production recorder: a fresh UUID-identified [`UdpDiscovery`]
    /// on [`DEFAULT_DISCOVERY_PORT`], writing through [`FileLog`].
    pub fn new(node: Arc<dyn Node>) -> Self {
        let discovery: Arc<dyn DiscoveryClient> =
            Arc::new(UdpDiscovery::new(Uuid::new_v4().to_string(), DEFAULT_DISCOVERY_PORT));
        Self::with_collaborators(discovery, node, default_log_factory())
    }

    /// Build a recorder from explicit collaborators — the entry point tests
    /// use to inject fakes, and production callers use to supply a
    /// pre-configured discovery port or log backend.
    pub fn with_collaborators(discovery: Arc<dyn DiscoveryClient>, node: Arc<dyn Node>, log_factory: LogFactory) -> Self {
        let wall_minus_mono_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_nanos() as i64;

        let inner = Arc::new(RecorderInner {
            node,
            log: Mutex::new(None),
            log_factory,
            topic_state: Mutex::new(TopicState::default()),
            wall_minus_mono_ns,
            mono_origin: Instant::now(),
        });

        let weak = Arc::downgrade(&inner);
        discovery.set_on_advertisement(Arc::new(move |publisher| {
            if let Some(inner) = weak.upgrade() {
                inner.on_advertisement(publisher);
            }
        }));
        discovery.start();

        Self { inner, _discovery: discovery }
    }

    /// Open `path` for writing and begin appending delivered messages to it.
    /// Fails with [`RecorderError::AlreadyRecording`] if already started.
    pub fn start(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.start(path.as_ref())
    }

    /// Close the current log, if any. Idempotent.
    pub fn stop(&self) {
        self.inner.stop()
    }

    /// Subscribe to exactly one bare topic name.
    pub fn add_topic(&self, topic: &str) -> Result<()> {
        self.inner.add_topic(topic)
    }

    /// Subscribe to every currently-known topic matching `pattern`, and
    /// retain `pattern` to match future advertisements. Returns the number
    /// of topics subscribed to as a result of this call.
    pub fn add_pattern(&self, pattern: Regex) -> Result<i64> {
        self.inner.add_pattern(pattern)
    }

    /// Path most recently passed to a successful [`Self::start`] call, if
    /// the recorder is currently recording under a [`FileLog`]-backed path.
    pub fn is_recording(&self) -> bool {
        self.inner.log.lock().is_some()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.inner.stop();
    }
}
