//! Typed discovery packets built atop [`Header`].

use tracing::warn;

use crate::header::Header;

/// Read a `u64`-length-prefixed byte string, native-endian, mirroring the
/// idiom the header codec uses for `process_uuid`.
fn read_len_prefixed(buf: &[u8]) -> Option<(&[u8], usize)> {
    if buf.len() < 8 {
        return None;
    }
    let len = u64::from_ne_bytes(buf[0..8].try_into().ok()?) as usize;
    let end = 8usize.checked_add(len)?;
    if buf.len() < end {
        return None;
    }
    Some((&buf[8..end], end))
}

fn write_len_prefixed(buf: &mut [u8], bytes: &[u8]) -> Option<usize> {
    let needed = 8 + bytes.len();
    if buf.len() < needed {
        return None;
    }
    buf[0..8].copy_from_slice(&(bytes.len() as u64).to_ne_bytes());
    buf[8..needed].copy_from_slice(bytes);
    Some(needed)
}

/// A subscription request: a [`Header`] plus the bare topic name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPacket {
    pub header: Header,
    pub topic: String,
}

impl SubscriptionPacket {
    pub fn new(header: Header, topic: impl Into<String>) -> Self {
        Self {
            header,
            topic: topic.into(),
        }
    }

    /// `header_length(header) + 8 + len(topic)`.
    pub fn msg_length(&self) -> usize {
        self.header.header_length() + 8 + self.topic.len()
    }

    /// Pack header then `u64 topic_len` + topic bytes. Returns `0` on any
    /// failure (invalid header, empty topic, buffer too small).
    pub fn pack(&self, buf: &mut [u8]) -> usize {
        if self.topic.is_empty() {
            warn!("refusing to pack subscription packet with empty topic");
            return 0;
        }

        let header_len = self.header.pack(buf);
        if header_len == 0 {
            return 0;
        }

        match write_len_prefixed(&mut buf[header_len..], self.topic.as_bytes()) {
            Some(body_len) => header_len + body_len,
            None => {
                warn!("buffer too small to pack subscription topic");
                0
            }
        }
    }

    /// Decode the body that follows an already-unpacked [`Header`]. Returns
    /// `(topic, bytes_consumed)`, or `None` on malformed input.
    pub fn unpack_body(buf: &[u8]) -> Option<(String, usize)> {
        let (topic_bytes, consumed) = read_len_prefixed(buf)?;
        let topic = std::str::from_utf8(topic_bytes).ok()?.to_string();
        Some((topic, consumed))
    }
}

/// Opaque endpoint description carried by an [`AdvertisePacket`].
///
/// The distilled spec treats `Publisher` as an externally-defined record with
/// its own `Pack`/`Unpack`/`MsgLength`; this rewrite supplies the concrete
/// shape SPEC_FULL.md §3 describes so the crate is self-contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publisher {
    /// Fully-qualified topic, e.g. `"@/robot@cmd"`.
    pub fqtn: String,
    /// Opaque payload "schema" tag.
    pub type_name: String,
    /// `host:port` a subscriber should connect to for the raw transport.
    pub addr: String,
}

impl Publisher {
    pub fn new(fqtn: impl Into<String>, type_name: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            fqtn: fqtn.into(),
            type_name: type_name.into(),
            addr: addr.into(),
        }
    }

    pub fn msg_length(&self) -> usize {
        (8 + self.fqtn.len()) + (8 + self.type_name.len()) + (8 + self.addr.len())
    }

    pub fn pack(&self, buf: &mut [u8]) -> usize {
        let mut offset = 0usize;
        for field in [&self.fqtn, &self.type_name, &self.addr] {
            match write_len_prefixed(&mut buf[offset..], field.as_bytes()) {
                Some(n) => offset += n,
                None => {
                    warn!("buffer too small to pack publisher record");
                    return 0;
                }
            }
        }
        offset
    }

    pub fn unpack(buf: &[u8]) -> Option<(Publisher, usize)> {
        let mut offset = 0usize;

        let (fqtn_bytes, n) = read_len_prefixed(&buf[offset..])?;
        let fqtn = std::str::from_utf8(fqtn_bytes).ok()?.to_string();
        offset += n;

        let (type_bytes, n) = read_len_prefixed(&buf[offset..])?;
        let type_name = std::str::from_utf8(type_bytes).ok()?.to_string();
        offset += n;

        let (addr_bytes, n) = read_len_prefixed(&buf[offset..])?;
        let addr = std::str::from_utf8(addr_bytes).ok()?.to_string();
        offset += n;

        Some((Publisher { fqtn, type_name, addr }, offset))
    }
}

/// An advertisement: a [`Header`] plus a [`Publisher`] record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisePacket {
    pub header: Header,
    pub publisher: Publisher,
}

impl AdvertisePacket {
    pub fn new(header: Header, publisher: Publisher) -> Self {
        Self { header, publisher }
    }

    pub fn msg_length(&self) -> usize {
        self.header.header_length() + self.publisher.msg_length()
    }

    pub fn pack(&self, buf: &mut [u8]) -> usize {
        let header_len = self.header.pack(buf);
        if header_len == 0 {
            return 0;
        }

        let body_len = self.publisher.pack(&mut buf[header_len..]);
        if body_len == 0 {
            return 0;
        }

        header_len + body_len
    }

    /// Decode the body that follows an already-unpacked [`Header`]. Returns
    /// `(publisher, bytes_consumed)`, or `None` on malformed input.
    pub fn unpack_body(buf: &[u8]) -> Option<(Publisher, usize)> {
        Publisher::unpack(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::MessageType;

    fn valid_header() -> Header {
        Header::new(1, "proc-1", MessageType::Subscribe, 0)
    }

    #[test]
    fn subscription_round_trips() {
        let pkt = SubscriptionPacket::new(valid_header(), "sensor/imu");
        let mut buf = vec![0u8; pkt.msg_length()];
        let written = pkt.pack(&mut buf);
        assert_eq!(written, pkt.msg_length());

        let (header, hlen) = Header::unpack(&buf).expect("header unpack");
        let (topic, blen) = SubscriptionPacket::unpack_body(&buf[hlen..]).expect("body unpack");
        assert_eq!(header, pkt.header);
        assert_eq!(topic, pkt.topic);
        assert_eq!(hlen + blen, pkt.msg_length());
    }

    #[test]
    fn subscription_pack_rejects_empty_topic() {
        let pkt = SubscriptionPacket::new(valid_header(), "");
        let mut buf = vec![0u8; pkt.header.header_length() + 8];
        assert_eq!(pkt.pack(&mut buf), 0);
    }

    #[test]
    fn subscription_pack_rejects_invalid_header() {
        let bad_header = Header::new(0, "proc-1", MessageType::Subscribe, 0);
        let pkt = SubscriptionPacket::new(bad_header, "sensor/imu");
        let mut buf = vec![0u8; pkt.msg_length()];
        assert_eq!(pkt.pack(&mut buf), 0);
    }

    #[test]
    fn publisher_round_trips() {
        let publisher = Publisher::new("@/robot@cmd", "application/octet-stream", "127.0.0.1:9000");
        let mut buf = vec![0u8; publisher.msg_length()];
        let written = publisher.pack(&mut buf);
        assert_eq!(written, publisher.msg_length());

        let (decoded, consumed) = Publisher::unpack(&buf).expect("publisher unpack");
        assert_eq!(decoded, publisher);
        assert_eq!(consumed, publisher.msg_length());
    }

    #[test]
    fn advertise_round_trips() {
        let publisher = Publisher::new("@/robot@cmd", "bytes", "127.0.0.1:9000");
        let pkt = AdvertisePacket::new(valid_header(), publisher.clone());
        let mut buf = vec![0u8; pkt.msg_length()];
        let written = pkt.pack(&mut buf);
        assert_eq!(written, pkt.msg_length());

        let (header, hlen) = Header::unpack(&buf).expect("header unpack");
        let (decoded_publisher, blen) = AdvertisePacket::unpack_body(&buf[hlen..]).expect("body unpack");
        assert_eq!(header, pkt.header);
        assert_eq!(decoded_publisher, publisher);
        assert_eq!(hlen + blen, pkt.msg_length());
    }

    #[test]
    fn any_pack_unpack_rejects_empty_buffer() {
        assert!(Header::unpack(&[]).is_none());
        assert!(SubscriptionPacket::unpack_body(&[]).is_none());
        assert!(Publisher::unpack(&[]).is_none());
    }
}
