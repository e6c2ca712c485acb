use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum Error {
    InvalidPacket { len: usize },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidPacket { len } => {
                write!(f, "tunneled packet too short: {} bytes, need at least 8 for the timestamp trailer", len)
            }
        }
    }
}

impl std::error::Error for Error {}
