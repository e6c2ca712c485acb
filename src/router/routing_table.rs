use std::sync::Arc;

use crate::router::link::LinkManager;

/// Maps a destination router id to the id of the next hop to forward
/// towards. The router worker interprets the result: `dest == name` means
/// deliver locally, a connected neighbor means forward, anything else means
/// drop as unroutable.
///
/// Swappable at runtime via [`DatagramRouter::set_routing_table`]; the
/// worker re-reads it on every handled datagram rather than caching it.
pub trait RoutingTable: Send {
    fn next_hop(&self, dest: u32) -> u32;

    /// Human-readable dump used in "unroutable destination" warnings.
    fn snapshot(&self) -> String;
}

/// Echoes `dest` back unchanged, with no awareness of any link manager. The
/// default table for a freshly constructed router: it delivers locally when
/// `dest` happens to equal the router's own id, and otherwise hands the
/// worker a "next hop" that can never match a connected neighbor (there are
/// none known to this table), so the datagram is dropped as unroutable.
pub struct LoopbackRoutingTable {
    router_name: u32,
}

impl LoopbackRoutingTable {
    pub fn new(router_name: u32) -> Self {
        Self { router_name }
    }
}

impl RoutingTable for LoopbackRoutingTable {
    fn next_hop(&self, dest: u32) -> u32 {
        dest
    }

    fn snapshot(&self) -> String {
        format!("loopback routing table for router {} (no neighbor awareness)", self.router_name)
    }
}

/// Routes directly to the destination id: the worker resolves "is this the
/// local router" and "is this a connected neighbor" against the value
/// returned here, so this table is free to simply echo `dest` back and let
/// the connected-links snapshot do the rest.
pub struct LocalRoutingTable {
    router_name: u32,
    link_manager: Arc<dyn LinkManager>,
}

impl LocalRoutingTable {
    pub fn new(router_name: u32, link_manager: Arc<dyn LinkManager>) -> Self {
        Self {
            router_name,
            link_manager,
        }
    }
}

impl RoutingTable for LocalRoutingTable {
    fn next_hop(&self, dest: u32) -> u32 {
        dest
    }

    fn snapshot(&self) -> String {
        let neighbors: Vec<u32> = self
            .link_manager
            .connected_links()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        format!(
            "local routing table for router {}: direct neighbors = {:?}",
            self.router_name, neighbors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::link::{DuplexLink, RouterLinkManager};

    #[test]
    fn loopback_echoes_destination() {
        let table = LoopbackRoutingTable::new(7);
        assert_eq!(table.next_hop(7), 7);
        assert_eq!(table.next_hop(999), 999);
    }

    #[test]
    fn local_table_echoes_destination() {
        let manager = Arc::new(RouterLinkManager::new());
        let (a, _b) = DuplexLink::pair();
        manager.add_link(2, Arc::new(a));

        let table = LocalRoutingTable::new(1, manager);
        assert_eq!(table.next_hop(1), 1);
        assert_eq!(table.next_hop(2), 2);
        assert_eq!(table.next_hop(99), 99);
    }
}
