//! The fixed-header binary wire protocol (§4.3): an 8-byte request header
//! followed by the key payload, and a 4-byte big-endian length prefix on
//! every response.

use num_enum::TryFromPrimitive;

pub const PROTOCOL_VERSION: u8 = 0x11;
pub const HEADER_LEN: usize = 8;
pub const MAX_KEY_LEN: u32 = 65536;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Action {
    Fetch = b'F',
    Describe = b'D',
    Stats = b's',
    Quit = b'q',
}

/// A parsed 8-byte request header. `key_len` has not yet been checked
/// against [`MAX_KEY_LEN`] — that is the connection state machine's job,
/// since the oversize case still has to consume and drop the key bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub version: u8,
    pub action_byte: u8,
    pub table_id: u8,
    pub index_id: u8,
    pub key_len: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    BadVersion(u8),
}

impl RequestHeader {
    /// Parses exactly [`HEADER_LEN`] bytes. Panics if given a shorter slice;
    /// callers are expected to only call this once `header_bytes_have ==
    /// HEADER_LEN`.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        assert_eq!(bytes.len(), HEADER_LEN);
        let version = bytes[0];
        if version != PROTOCOL_VERSION {
            return Err(HeaderError::BadVersion(version));
        }
        let key_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(RequestHeader {
            version,
            action_byte: bytes[1],
            table_id: bytes[2],
            index_id: bytes[3],
            key_len,
        })
    }

    pub fn action(&self) -> Option<Action> {
        Action::try_from(self.action_byte).ok()
    }
}

/// The 4 zero bytes sent for a cache miss, a discarded oversized key, or any
/// fetch failure.
pub const MISS_RESPONSE: [u8; 4] = [0, 0, 0, 0];

/// Frames an owned payload (schema/stats/quit JSON) as `len_be(4) || bytes`.
pub fn frame_owned(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fetch_header_from_the_literal_wire_example() {
        // ver=0x11 action='F' table_id=1 index_id=0 key_len=4
        let bytes = [0x11, b'F', 0x01, 0x00, 0x00, 0x00, 0x00, 0x04];
        let header = RequestHeader::parse(&bytes).unwrap();
        assert_eq!(header.action(), Some(Action::Fetch));
        assert_eq!(header.table_id, 1);
        assert_eq!(header.index_id, 0);
        assert_eq!(header.key_len, 4);
    }

    #[test]
    fn rejects_wrong_version() {
        let bytes = [0x10, b'F', 0, 0, 0, 0, 0, 0];
        assert_eq!(RequestHeader::parse(&bytes), Err(HeaderError::BadVersion(0x10)));
    }

    #[test]
    fn oversized_key_len_is_still_parsed_for_discard_handling() {
        // key_len = 65536 = MAX_KEY_LEN, boundary is accepted by the header
        // parser; MAX_KEY_LEN + 1 must still parse so the connection can
        // enter discard mode.
        let bytes = [0x11, b'F', 0x01, 0x00, 0x00, 0x01, 0x00, 0x01];
        let header = RequestHeader::parse(&bytes).unwrap();
        assert_eq!(header.key_len, MAX_KEY_LEN + 1);
    }
}
