//! Discovery packet header: wire layout shared by every control packet.
//!
//! Byte order is host-native, matching the source this protocol was
//! distilled from — see `SPEC_FULL.md` §9 ("Endianness"). This makes the
//! protocol non-portable across mismatched-endian hosts by design; do not
//! "fix" this to a fixed endianness without bumping the wire version.

use tracing::warn;

/// Discriminant for the discovery control-packet type.
///
/// `Uninitialized` is the sentinel meaning "unset"; a [`Header`] carrying it
/// is never valid for packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MessageType {
    #[default]
    Uninitialized = 0,
    Advertise = 1,
    Subscribe = 2,
    Unadvertise = 3,
    Heartbeat = 4,
    Bye = 5,
    NewConnection = 6,
    EndConnection = 7,
}

impl MessageType {
    /// Recover a `MessageType` from its wire discriminant.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uninitialized),
            1 => Some(Self::Advertise),
            2 => Some(Self::Subscribe),
            3 => Some(Self::Unadvertise),
            4 => Some(Self::Heartbeat),
            5 => Some(Self::Bye),
            6 => Some(Self::NewConnection),
            7 => Some(Self::EndConnection),
            _ => None,
        }
    }
}

/// Common header carried by every discovery control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub process_uuid: String,
    pub r#type: MessageType,
    pub flags: u16,
}

impl Header {
    pub fn new(version: u16, process_uuid: impl Into<String>, r#type: MessageType, flags: u16) -> Self {
        Self {
            version,
            process_uuid: process_uuid.into(),
            r#type,
            flags,
        }
    }

    /// A header is valid for packing iff `version != 0 && process_uuid != "" &&
    /// type != Uninitialized`.
    pub fn is_valid_for_packing(&self) -> bool {
        self.version != 0 && !self.process_uuid.is_empty() && self.r#type != MessageType::Uninitialized
    }

    /// `2 (version) + 8 (uuid_len) + len(process_uuid) + 1 (type) + 2 (flags)`.
    pub fn header_length(&self) -> usize {
        2 + 8 + self.process_uuid.len() + 1 + 2
    }

    /// Pack this header into `buf`. Returns the number of bytes written, or
    /// `0` on failure (invalid header, or buffer too small) — never panics.
    pub fn pack(&self, buf: &mut [u8]) -> usize {
        if !self.is_valid_for_packing() {
            warn!("refusing to pack invalid discovery header");
            return 0;
        }

        let needed = self.header_length();
        if buf.len() < needed {
            warn!(needed, available = buf.len(), "buffer too small to pack discovery header");
            return 0;
        }

        let uuid_bytes = self.process_uuid.as_bytes();
        let uuid_len = uuid_bytes.len() as u64;

        buf[0..2].copy_from_slice(&self.version.to_ne_bytes());
        buf[2..10].copy_from_slice(&uuid_len.to_ne_bytes());
        buf[10..10 + uuid_bytes.len()].copy_from_slice(uuid_bytes);
        buf[10 + uuid_bytes.len()] = self.r#type as u8;
        let flags_off = 11 + uuid_bytes.len();
        buf[flags_off..flags_off + 2].copy_from_slice(&self.flags.to_ne_bytes());

        needed
    }

    /// Decode a header from `buf`. Returns `(header, bytes_consumed)`, or
    /// `None` if `buf` is too short or malformed.
    pub fn unpack(buf: &[u8]) -> Option<(Header, usize)> {
        if buf.len() < 10 {
            warn!("discovery header truncated before uuid length field");
            return None;
        }

        let version = u16::from_ne_bytes([buf[0], buf[1]]);
        let uuid_len = u64::from_ne_bytes(buf[2..10].try_into().ok()?) as usize;

        let after_uuid = 10usize.checked_add(uuid_len)?;
        if buf.len() < after_uuid + 1 + 2 {
            warn!(uuid_len, "discovery header truncated before type/flags fields");
            return None;
        }

        let process_uuid = match std::str::from_utf8(&buf[10..after_uuid]) {
            Ok(s) => s.to_string(),
            Err(_) => {
                warn!("discovery header process_uuid is not valid utf-8");
                return None;
            }
        };

        let type_byte = buf[after_uuid];
        let r#type = match MessageType::from_u8(type_byte) {
            Some(t) => t,
            None => {
                warn!(type_byte, "unknown discovery message type");
                return None;
            }
        };

        let flags_off = after_uuid + 1;
        let flags = u16::from_ne_bytes([buf[flags_off], buf[flags_off + 1]]);

        let header = Header {
            version,
            process_uuid,
            r#type,
            flags,
        };
        let consumed = flags_off + 2;
        Some((header, consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_header() -> Header {
        Header::new(1, "abc", MessageType::Advertise, 0)
    }

    // Note: the distilled spec's worked example states `header_length == 15`
    // for this header, but its own byte-offset table (flags at `11+L..13+L`,
    // i.e. `[14..16)` for `L=3`) only adds up to 16. DESIGN.md records this
    // as a numeric inconsistency in the source material, resolved in favor
    // of the offset table.
    #[test]
    fn header_length_matches_layout() {
        let h = valid_header();
        assert_eq!(h.header_length(), 16);
    }

    #[test]
    fn pack_produces_expected_byte_layout() {
        let h = valid_header();
        let mut buf = [0u8; 16];
        let written = h.pack(&mut buf);
        assert_eq!(written, 16);

        assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 1);
        assert_eq!(u64::from_ne_bytes(buf[2..10].try_into().unwrap()), 3);
        assert_eq!(&buf[10..13], b"abc");
        assert_eq!(buf[13], MessageType::Advertise as u8);
        assert_eq!(u16::from_ne_bytes([buf[14], buf[15]]), 0);
    }

    #[test]
    fn round_trip_preserves_header() {
        let h = valid_header();
        let mut buf = vec![0u8; h.header_length()];
        let written = h.pack(&mut buf);
        assert_eq!(written, h.header_length());

        let (decoded, consumed) = Header::unpack(&buf).expect("unpack should succeed");
        assert_eq!(consumed, h.header_length());
        assert_eq!(decoded, h);
    }

    #[test]
    fn pack_rejects_zero_version() {
        let h = Header::new(0, "abc", MessageType::Advertise, 0);
        let mut buf = vec![0u8; h.header_length()];
        assert_eq!(h.pack(&mut buf), 0);
    }

    #[test]
    fn pack_rejects_empty_uuid() {
        let h = Header::new(1, "", MessageType::Advertise, 0);
        let mut buf = vec![0u8; h.header_length()];
        assert_eq!(h.pack(&mut buf), 0);
    }

    #[test]
    fn pack_rejects_uninitialized_type() {
        let h = Header::new(1, "abc", MessageType::Uninitialized, 0);
        let mut buf = vec![0u8; h.header_length()];
        assert_eq!(h.pack(&mut buf), 0);
    }

    #[test]
    fn pack_rejects_buffer_too_small() {
        let h = valid_header();
        let mut buf = vec![0u8; 3];
        assert_eq!(h.pack(&mut buf), 0);
    }

    #[test]
    fn unpack_rejects_empty_buffer() {
        assert!(Header::unpack(&[]).is_none());
    }

    #[test]
    fn unpack_rejects_truncated_buffer() {
        let h = valid_header();
        let mut buf = vec![0u8; h.header_length()];
        h.pack(&mut buf);
        assert!(Header::unpack(&buf[..buf.len() - 1]).is_none());
    }
}
