use crc::{Crc, CRC_32_ISO_HDLC};

/// The CRC-32 used on the wire: IEEE 802.3 polynomial (same table as the
/// common `crc32` implementation shipped by most language runtimes).
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Computes the CRC-32 of `data`.
pub fn checksum(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
