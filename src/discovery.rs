//! The `MsgDiscovery` collaborator: advertisement broadcast and receipt.
//!
//! The distilled spec treats this as an external interface
//! (`MsgDiscovery(uuid, port)`, `ConnectionsCb`, `Start`). SPEC_FULL.md §4.D
//! supplements it with a concrete [`UdpDiscovery`] so the crate is runnable
//! end-to-end; the recorder itself only ever depends on the
//! [`DiscoveryClient`] trait.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::header::{Header, MessageType};
use crate::packet::{AdvertisePacket, Publisher};

/// The well-known UDP port discovery sockets bind to by default.
pub const DEFAULT_DISCOVERY_PORT: u16 = 14000;

/// Callback invoked for every well-formed advertisement observed.
pub type AdvertisementCallback = Arc<dyn Fn(Publisher) + Send + Sync>;

/// The discovery channel a [`crate::recorder::Recorder`] observes
/// advertisements through.
///
/// Mirrors the external contract: `MsgDiscovery(uuid, port)` with
/// `ConnectionsCb(fn(Publisher))` and `Start()`.
pub trait DiscoveryClient: Send + Sync {
    /// Register the callback invoked for every observed advertisement.
    /// Replaces any previously registered callback.
    fn set_on_advertisement(&self, cb: AdvertisementCallback);

    /// Start listening. Idempotent; a second call is a no-op.
    fn start(&self);

    /// Advertise a locally-owned publisher. Used by peers that both record
    /// and publish; the recorder itself never calls this.
    fn advertise(&self, publisher: Publisher);
}

/// Minimal UDP broadcast-based [`DiscoveryClient`].
///
/// Binds a broadcast-enabled UDP socket on `port`, spawns a background
/// reader task (on a dedicated runtime, so this works outside a tokio
/// context) that decodes every datagram as `Header` + advertise body and
/// invokes the registered callback for well-formed `Advertise` packets, and
/// periodically re-broadcasts any publishers registered via [`Self::advertise`].
/// This is a same-subnet-oriented reference implementation, not a
/// production discovery service — see SPEC_FULL.md §4.D.
pub struct UdpDiscovery {
    process_uuid: String,
    port: u16,
    on_advertisement: Arc<Mutex<Option<AdvertisementCallback>>>,
    advertised: Arc<Mutex<Vec<Publisher>>>,
    runtime: tokio::runtime::Runtime,
}

impl UdpDiscovery {
    pub fn new(process_uuid: impl Into<String>, port: u16) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("failed to start discovery runtime");

        Self {
            process_uuid: process_uuid.into(),
            port,
            on_advertisement: Arc::new(Mutex::new(None)),
            advertised: Arc::new(Mutex::new(Vec::new())),
            runtime,
        }
    }

    fn broadcast_addr(&self) -> SocketAddr {
        SocketAddr::from(([255, 255, 255, 255], self.port))
    }

    async fn run(socket: Arc<UdpSocket>, on_advertisement: Arc<Mutex<Option<AdvertisementCallback>>>) {
        let mut buf = vec![0u8; 65_535];
        loop {
            let (n, _peer) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "discovery socket read failed");
                    continue;
                }
            };

            let Some((header, consumed)) = Header::unpack(&buf[..n]) else {
                warn!("dropping malformed discovery packet (bad header)");
                continue;
            };

            if header.r#type != MessageType::Advertise {
                continue;
            }

            let Some((publisher, _)) = AdvertisePacket::unpack_body(&buf[consumed..n]) else {
                warn!("dropping malformed discovery packet (bad advertise body)");
                continue;
            };

            if let Some(cb) = on_advertisement.lock().clone() {
                cb(publisher);
            }
        }
    }

    async fn run_broadcaster(socket: Arc<UdpSocket>, broadcast_addr: SocketAddr, process_uuid: String, advertised: Arc<Mutex<Vec<Publisher>>>) {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            let publishers = advertised.lock().clone();
            for publisher in publishers {
                let header = Header::new(1, process_uuid.clone(), MessageType::Advertise, 0);
                let packet = AdvertisePacket::new(header, publisher);
                let mut buf = vec![0u8; packet.msg_length()];
                let written = packet.pack(&mut buf);
                if written == 0 {
                    continue;
                }
                if let Err(e) = socket.send_to(&buf[..written], broadcast_addr).await {
                    warn!(error = %e, "failed to broadcast advertisement");
                }
            }
        }
    }
}

impl DiscoveryClient for UdpDiscovery {
    fn set_on_advertisement(&self, cb: AdvertisementCallback) {
        *self.on_advertisement.lock() = Some(cb);
    }

    fn start(&self) {
        let bind_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let socket = match self.runtime.block_on(UdpSocket::bind(bind_addr)) {
            Ok(s) => s,
            Err(e) => {
                warn!(port = self.port, error = %e, "failed to bind discovery socket");
                return;
            }
        };
        if let Err(e) = socket.set_broadcast(true) {
            warn!(error = %e, "failed to enable broadcast on discovery socket");
        }

        info!(port = self.port, uuid = %self.process_uuid, "discovery client started");

        // `UdpSocket::recv_from`/`send_to` take `&self`, so the reader and
        // broadcaster tasks can safely share one socket handle.
        let socket = Arc::new(socket);

        self.runtime
            .spawn(Self::run(Arc::clone(&socket), Arc::clone(&self.on_advertisement)));

        self.runtime.spawn(Self::run_broadcaster(
            socket,
            self.broadcast_addr(),
            self.process_uuid.clone(),
            Arc::clone(&self.advertised),
        ));
    }

    fn advertise(&self, publisher: Publisher) {
        self.advertised.lock().push(publisher);
    }
}

/// An in-memory [`DiscoveryClient`] fake for deterministic tests:
/// `start()` is a no-op, and [`FakeDiscoveryClient::fire`] synchronously
/// invokes the registered callback, standing in for a discovery thread.
#[cfg(test)]
pub struct FakeDiscoveryClient {
    on_advertisement: Mutex<Option<AdvertisementCallback>>,
}

#[cfg(test)]
impl Default for FakeDiscoveryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl FakeDiscoveryClient {
    pub fn new() -> Self {
        Self {
            on_advertisement: Mutex::new(None),
        }
    }

    /// Simulate an incoming advertisement, as a real discovery thread would.
    pub fn fire(&self, publisher: Publisher) {
        if let Some(cb) = self.on_advertisement.lock().clone() {
            cb(publisher);
        }
    }
}

#[cfg(test)]
impl DiscoveryClient for FakeDiscoveryClient {
    fn set_on_advertisement(&self, cb: AdvertisementCallback) {
        *self.on_advertisement.lock() = Some(cb);
    }

    fn start(&self) {
        debug!("fake discovery client started");
    }

    fn advertise(&self, _publisher: Publisher) {}
}
