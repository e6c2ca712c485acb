use std::convert::TryInto;

use crate::clock::now_seconds;
use crate::datagram::Datagram;
use crate::error::Result;
use crate::service::error::Error;

/// The unit exchanged between services sitting above the datagram layer.
#[derive(Debug, Clone)]
pub struct Packet {
    pub src: u32,
    pub dest: u32,
    pub data: Vec<u8>,
    /// The neighbor that handed the enclosing datagram to the local router.
    /// Set to the handle's own router name for locally originated packets
    /// and for packets not yet delivered.
    pub delivered_from: u32,
    /// Overloaded: on send, the wall-clock time the packet entered the
    /// pipeline; on receive, the observed one-way latency in seconds.
    pub time: f64,
}

/// Identity ignores `time`, same rationale as [`Datagram`]'s equality.
impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.src == other.src && self.dest == other.dest && self.data == other.data && self.delivered_from == other.delivered_from
    }
}

/// Tunnels a packet as a datagram of the given protocol, appending the
/// packet's timestamp as an 8-byte little-endian trailer.
pub fn packet_to_datagram(protocol: u16, packet: &Packet) -> Datagram {
    let mut data = Vec::with_capacity(packet.data.len() + 8);
    data.extend_from_slice(&packet.data);
    data.extend_from_slice(&packet.time.to_le_bytes());
    Datagram::new(protocol, packet.src, packet.dest, data)
}

/// Reverses [`packet_to_datagram`], turning the elapsed time since send into
/// the packet's `time` field.
pub fn datagram_to_packet(delivered_from: u32, datagram: &Datagram) -> Result<Packet> {
    if datagram.data.len() < 8 {
        return Err(Error::InvalidPacket { len: datagram.data.len() }.into());
    }

    let split = datagram.data.len() - 8;
    let send_time = f64::from_le_bytes(datagram.data[split..].try_into().unwrap());

    Ok(Packet {
        src: datagram.src,
        dest: datagram.dest,
        data: datagram.data[..split].to_vec(),
        delivered_from,
        time: now_seconds() - send_time,
    })
}
