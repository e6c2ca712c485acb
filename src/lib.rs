//! In-process emulation of a small packet-switched network.
//!
//! A [`router::DatagramRouter`] forwards binary-framed datagrams between
//! neighbors by routing-table lookup; a [`service::ServiceManager`] sits
//! above one router and multiplexes higher-level [`service::packet::Packet`]
//! traffic onto it by protocol tag. Both run their own background worker
//! thread and are driven entirely through their public handles.

pub mod clock;
pub mod config;
pub mod crc32;
pub mod datagram;
pub mod error;
pub mod hex;
pub mod router;
pub mod service;
