//! On-disk format shared by the store and the index.
//!
//! Store record:
//! ```text
//! | length: u64 | payload: [u8; length] |
//! | 8 bytes     | variable              |
//! ```
//!
//! Index entry:
//! ```text
//! | relative offset: u32 | position: u64 |
//! | 4 bytes              | 8 bytes       |
//! ```
//!
//! All integers are big-endian.

/// Width of the length prefix in front of every store record.
pub const LEN_WIDTH: u64 = 8;

/// Width of the relative offset in an index entry.
pub const OFF_WIDTH: u64 = 4;

/// Width of the store position in an index entry.
pub const POS_WIDTH: u64 = 8;

/// Width of one index entry.
pub const ENT_WIDTH: u64 = OFF_WIDTH + POS_WIDTH;

/// Description of the binary layout.
///
/// Both `Store` and `Index` hold a copy of the same value so the widths and
/// byte order cannot drift apart between the two files. Fields are private:
/// `BIG_ENDIAN` is the only layout the encoders below produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    len_width: u64,
    off_width: u64,
    pos_width: u64,
}

impl Format {
    /// The only layout written by this crate.
    pub const BIG_ENDIAN: Format = Format {
        len_width: LEN_WIDTH,
        off_width: OFF_WIDTH,
        pos_width: POS_WIDTH,
    };

    pub const fn len_width(&self) -> u64 {
        self.len_width
    }

    pub const fn off_width(&self) -> u64 {
        self.off_width
    }

    pub const fn pos_width(&self) -> u64 {
        self.pos_width
    }

    pub const fn entry_width(&self) -> u64 {
        self.off_width + self.pos_width
    }

    /// Bytes a record of `payload_len` occupies in the store.
    pub const fn record_width(&self, payload_len: u64) -> u64 {
        self.len_width + payload_len
    }

    pub fn encode_len(&self, len: u64) -> [u8; LEN_WIDTH as usize] {
        len.to_be_bytes()
    }

    pub fn decode_len(&self, buf: [u8; LEN_WIDTH as usize]) -> u64 {
        u64::from_be_bytes(buf)
    }

    pub fn encode_entry(&self, offset: u32, position: u64) -> [u8; ENT_WIDTH as usize] {
        let mut entry = [0u8; ENT_WIDTH as usize];
        entry[..OFF_WIDTH as usize].copy_from_slice(&offset.to_be_bytes());
        entry[OFF_WIDTH as usize..].copy_from_slice(&position.to_be_bytes());
        entry
    }

    /// Decode one entry. `buf` must be exactly `ENT_WIDTH` bytes long.
    pub fn decode_entry(&self, buf: &[u8]) -> Option<(u32, u64)> {
        if buf.len() != ENT_WIDTH as usize {
            return None;
        }
        let (off, pos) = buf.split_at(OFF_WIDTH as usize);
        let offset = u32::from_be_bytes(off.try_into().ok()?);
        let position = u64::from_be_bytes(pos.try_into().ok()?);
        Some((offset, position))
    }
}

impl Default for Format {
    fn default() -> Self {
        Format::BIG_ENDIAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        let f = Format::BIG_ENDIAN;
        assert_eq!(f.entry_width(), 12);
        assert_eq!(f.record_width(11), 19);
    }

    #[test]
    fn test_widths_match_encoded_lengths() {
        let f = Format::default();
        assert_eq!(f, Format::BIG_ENDIAN);
        assert_eq!(f.len_width(), f.encode_len(0).len() as u64);
        assert_eq!(f.entry_width(), f.encode_entry(0, 0).len() as u64);
        assert_eq!(f.off_width() + f.pos_width(), ENT_WIDTH);
        assert_eq!(f.record_width(0), LEN_WIDTH);
    }

    #[test]
    fn test_entry_layout_is_big_endian() {
        let f = Format::BIG_ENDIAN;
        let entry = f.encode_entry(1, 19);
        assert_eq!(&entry[..4], &[0, 0, 0, 1]);
        assert_eq!(&entry[4..], &[0, 0, 0, 0, 0, 0, 0, 19]);
        assert_eq!(f.decode_entry(&entry), Some((1, 19)));
    }

    #[test]
    fn test_decode_entry_rejects_wrong_width() {
        let f = Format::BIG_ENDIAN;
        assert_eq!(f.decode_entry(&[0u8; 11]), None);
        assert_eq!(f.decode_entry(&[0u8; 13]), None);
    }

    #[test]
    fn test_len_prefix() {
        let f = Format::BIG_ENDIAN;
        let buf = f.encode_len(11);
        assert_eq!(buf, [0, 0, 0, 0, 0, 0, 0, 11]);
        assert_eq!(f.decode_len(buf), 11);
    }
}
