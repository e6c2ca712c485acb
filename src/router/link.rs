use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// A bidirectional frame transport between exactly two routers.
///
/// Implementations are shared, read-only references from the router
/// worker's point of view: the worker never caches a link across
/// iterations, it re-reads the current neighbor set from the
/// [`LinkManager`] every time.
pub trait Link: Send + Sync {
    /// Hands a frame to the link. Never blocks.
    fn send(&self, bytes: Vec<u8>);
    /// Pops the next frame, if any. Blocks the caller when `block` is true
    /// and none is currently available.
    fn receive(&self, block: bool) -> Option<Vec<u8>>;
}

/// Snapshot of currently-connected neighbors, as a map from neighbor id to
/// link handle.
pub trait LinkManager: Send + Sync {
    fn connected_links(&self) -> Vec<(u32, Arc<dyn Link>)>;
}

/// An in-memory full-duplex byte-frame channel. Used by the crate's own
/// tests and demos in place of a real socket or serial transport.
pub struct DuplexLink {
    outbox: Sender<Vec<u8>>,
    inbox: Mutex<Receiver<Vec<u8>>>,
}

impl DuplexLink {
    /// Creates a connected pair of endpoints: bytes sent on one side are
    /// observed on the other.
    pub fn pair() -> (DuplexLink, DuplexLink) {
        let (tx_ab, rx_ab) = mpsc::channel();
        let (tx_ba, rx_ba) = mpsc::channel();

        (
            DuplexLink {
                outbox: tx_ab,
                inbox: Mutex::new(rx_ba),
            },
            DuplexLink {
                outbox: tx_ba,
                inbox: Mutex::new(rx_ab),
            },
        )
    }
}

impl Link for DuplexLink {
    fn send(&self, bytes: Vec<u8>) {
        // The peer may have been dropped; the core does not retry or report
        // this, matching the "no reconnection semantics" contract.
        let _ = self.outbox.send(bytes);
    }

    fn receive(&self, block: bool) -> Option<Vec<u8>> {
        let inbox = self.inbox.lock().unwrap();
        if block {
            inbox.recv().ok()
        } else {
            inbox.try_recv().ok()
        }
    }
}

/// A registry from neighbor id to link handle, queried fresh by the router
/// worker on every iteration. Backed by a `Vec` rather than a `HashMap` so
/// that `connected_links()` preserves neighbor insertion order, matching
/// §4.2's "processed in the insertion order of their respective containers"
/// ordering guarantee for the inbound sweep.
#[derive(Default)]
pub struct RouterLinkManager {
    links: Mutex<Vec<(u32, Arc<dyn Link>)>>,
}

impl RouterLinkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `link` under `neighbor`. Re-adding an already-registered
    /// neighbor replaces its link in place, keeping its original position.
    pub fn add_link(&self, neighbor: u32, link: Arc<dyn Link>) {
        let mut links = self.links.lock().unwrap();
        match links.iter_mut().find(|(id, _)| *id == neighbor) {
            Some(entry) => entry.1 = link,
            None => links.push((neighbor, link)),
        }
    }

    pub fn remove_link(&self, neighbor: u32) {
        self.links.lock().unwrap().retain(|(id, _)| *id != neighbor);
    }
}

impl LinkManager for RouterLinkManager {
    fn connected_links(&self) -> Vec<(u32, Arc<dyn Link>)> {
        self.links.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplex_link_round_trip() {
        let (a, b) = DuplexLink::pair();
        a.send(b"hello".to_vec());
        assert_eq!(b.receive(false), Some(b"hello".to_vec()));
        assert_eq!(b.receive(false), None);

        b.send(b"reply".to_vec());
        assert_eq!(a.receive(false), Some(b"reply".to_vec()));
    }

    #[test]
    fn link_manager_snapshot() {
        let manager = RouterLinkManager::new();
        assert!(manager.connected_links().is_empty());

        let (a, _b) = DuplexLink::pair();
        manager.add_link(2, Arc::new(a));

        let snapshot = manager.connected_links();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, 2);

        manager.remove_link(2);
        assert!(manager.connected_links().is_empty());
    }
}
