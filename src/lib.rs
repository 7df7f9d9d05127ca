//! Discovery wire protocol and topic-recording engine for a pub/sub
//! transport layer.
//!
//! This crate provides:
//!
//! - A UDP-broadcast discovery protocol for announcing and observing
//!   publishers ([`header`], [`packet`], [`discovery`]).
//! - A [`Recorder`] that matches advertised topics against registered names
//!   and regex patterns, subscribes to each match exactly once, and appends
//!   every delivered message to a durable [`log::Log`].
//!
//! ## Components
//!
//! - [`Recorder`]: the topic-matching, message-logging engine
//! - [`discovery::UdpDiscovery`]: reference [`discovery::DiscoveryClient`] implementation
//! - [`node::UdpNode`]: reference [`node::Node`] implementation
//! - [`log::FileLog`]: reference [`log::Log`] implementation
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pubsub_recorder::{Recorder, node::UdpNode};
//!
//! let node = Arc::new(UdpNode::new("/robot"));
//! let recorder = Recorder::new(node);
//! recorder.start("session.log")?;
//! recorder.add_pattern(regex::Regex::new("^sensor/")?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod header;
pub mod log;
pub mod node;
pub mod packet;
pub mod recorder;
pub mod topic;
pub mod types;

pub use config::Config;
pub use discovery::{DiscoveryClient, UdpDiscovery, DEFAULT_DISCOVERY_PORT};
pub use error::{ConfigError, RecorderError, Result};
pub use header::{Header, MessageType};
pub use log::{FileLog, Log};
pub use node::{Node, UdpNode};
pub use packet::{AdvertisePacket, Publisher, SubscriptionPacket};
pub use recorder::Recorder;
