//! Shared types used across the `Node`/`Log`/`DiscoveryClient` collaborator
//! interfaces consumed by the recorder engine.

/// Metadata accompanying a raw message delivered by [`crate::node::Node`].
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub topic: String,
    pub type_name: String,
}

/// Mode a [`crate::log::Log`] is opened in.
///
/// The distilled spec only ever opens logs for writing; this enum exists so
/// the `Log` trait's signature matches the external contract's `Open(path,
/// mode)` shape rather than hard-coding a single mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Write,
}
