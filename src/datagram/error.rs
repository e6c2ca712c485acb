use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum Error {
    TooShort { len: usize },
    LengthMismatch { embedded: u32, expected: u32 },
    ChecksumMismatch { embedded: u32, expected: u32 },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::TooShort { len } => {
                write!(f, "datagram too short: {} bytes, need at least {}", len, super::FIXED_OVERHEAD)
            }
            Error::LengthMismatch { embedded, expected } => {
                write!(f, "invalid data length: embedded {}, expected {}", embedded, expected)
            }
            Error::ChecksumMismatch { embedded, expected } => {
                write!(f, "invalid checksum: {:#010x}, expected {:#010x}", embedded, expected)
            }
        }
    }
}

impl std::error::Error for Error {}
