pub mod link;
pub mod routing_table;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

use log::{info, warn};

use crate::clock::now_seconds;
use crate::config::Config;
use crate::datagram::Datagram;
use crate::hex::hex;
use crate::router::link::LinkManager;
use crate::router::routing_table::{LoopbackRoutingTable, RoutingTable};

/// A single router's worker thread: pulls frames off its links, decodes
/// them, consults the routing table, and either delivers locally, forwards
/// onto a neighbor link, or drops and logs.
///
/// Construction spawns the worker immediately; [`DatagramRouter::terminate`]
/// (or dropping the router) signals it to stop and joins it.
pub struct DatagramRouter {
    name: u32,
    outbound_tx: Sender<Datagram>,
    inbound_rx: Mutex<Receiver<(u32, Datagram)>>,
    routing_table: Arc<Mutex<Box<dyn RoutingTable>>>,
    terminate: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DatagramRouter {
    /// Creates a router with the default [`LoopbackRoutingTable`].
    pub fn new(name: u32, link_manager: Arc<dyn LinkManager>) -> Self {
        let routing_table: Box<dyn RoutingTable> = Box::new(LoopbackRoutingTable::new(name));
        Self::with_routing_table(name, link_manager, routing_table)
    }

    pub fn with_routing_table(
        name: u32,
        link_manager: Arc<dyn LinkManager>,
        routing_table: Box<dyn RoutingTable>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Datagram>();
        let (inbound_tx, inbound_rx) = mpsc::channel::<(u32, Datagram)>();
        let routing_table = Arc::new(Mutex::new(routing_table));
        let terminate = Arc::new(AtomicBool::new(false));
        let config = Config::from_env();

        let worker = {
            let routing_table = routing_table.clone();
            let terminate = terminate.clone();
            thread::Builder::new()
                .name(format!("datagram-router-{}", name))
                .spawn(move || worker_loop(name, link_manager, outbound_rx, inbound_tx, routing_table, terminate, config))
                .expect("failed to spawn datagram router worker thread")
        };

        DatagramRouter {
            name,
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            routing_table,
            terminate,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn name(&self) -> u32 {
        self.name
    }

    /// Queues a datagram to be routed. Calling this after [`terminate`] has
    /// returned is a programmer error: the worker is gone and the channel
    /// is closed, so this panics.
    ///
    /// [`terminate`]: DatagramRouter::terminate
    pub fn send(&self, datagram: Datagram) {
        self.outbound_tx
            .send(datagram)
            .expect("send() called on a terminated DatagramRouter");
    }

    /// Pops the next datagram delivered to this router (i.e. one whose
    /// route resolved to this router's own name), together with the
    /// neighbor id it was received from (or this router's own name, for
    /// datagrams submitted locally via `send`).
    ///
    /// Returns `None` immediately if `block` is false and nothing is
    /// waiting, or once the router has terminated.
    pub fn receive(&self, block: bool) -> Option<(u32, Datagram)> {
        let inbox = self.inbound_rx.lock().unwrap();
        if block {
            inbox.recv().ok()
        } else {
            inbox.try_recv().ok()
        }
    }

    /// Swaps in a new routing table, effective on the worker's next
    /// iteration.
    pub fn set_routing_table(&self, routing_table: Box<dyn RoutingTable>) {
        *self.routing_table.lock().unwrap() = routing_table;
    }

    /// Signals the worker thread to stop and waits for it to exit. Safe to
    /// call more than once; the second call is a no-op.
    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DatagramRouter {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn worker_loop(
    name: u32,
    link_manager: Arc<dyn LinkManager>,
    outbound_rx: Receiver<Datagram>,
    inbound_tx: Sender<(u32, Datagram)>,
    routing_table: Arc<Mutex<Box<dyn RoutingTable>>>,
    terminate: Arc<AtomicBool>,
    config: Config,
) {
    info!("router {}: worker thread started", name);

    let handle_datagram = |from: u32, mut datagram: Datagram, neighbors: &[(u32, Arc<dyn link::Link>)]| {
        let next = routing_table.lock().unwrap().next_hop(datagram.dest);

        if next == name {
            // The receiver may have gone away (router dropped while a
            // datagram was in flight); there is nobody left to tell.
            let _ = inbound_tx.send((from, datagram));
            return;
        }

        match neighbors.iter().find(|(id, _)| *id == next) {
            Some((_, link)) => {
                datagram.time = now_seconds();
                link.send(datagram.encode());
            }
            None => {
                let snapshot = routing_table.lock().unwrap().snapshot();
                warn!(
                    "router {}: dropping datagram to {} (next hop {} is not connected); from {}; {}",
                    name, datagram.dest, next, from, snapshot
                );
            }
        }
    };

    loop {
        if terminate.load(Ordering::SeqCst) {
            break;
        }

        let neighbors = link_manager.connected_links();

        for (neighbor, link) in &neighbors {
            while let Some(raw) = link.receive(false) {
                match Datagram::decode(&raw) {
                    Ok(datagram) => handle_datagram(*neighbor, datagram, &neighbors),
                    Err(err) => {
                        warn!(
                            "router {}: dropped malformed frame from {}: {} (0x{})",
                            name,
                            neighbor,
                            err,
                            hex(&raw)
                        );
                    }
                }
            }
        }

        while let Ok(datagram) = outbound_rx.try_recv() {
            handle_datagram(name, datagram, &neighbors);
        }

        thread::sleep(config.thread_sleep_time);
    }

    info!("router {}: worker thread exiting", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::link::{DuplexLink, Link, RouterLinkManager};
    use crate::router::routing_table::LocalRoutingTable;
    use std::time::Duration;

    fn recv_with_timeout(router: &DatagramRouter, timeout: Duration) -> Option<(u32, Datagram)> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(result) = router.receive(false) {
                return Some(result);
            }
            if std::time::Instant::now() >= deadline {
                return None;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loopback_router_delivers_to_itself() {
        let manager: Arc<dyn LinkManager> = Arc::new(RouterLinkManager::new());
        let router = DatagramRouter::new(1, manager);

        let sent = Datagram::new(10, 1, 1, b"hello".to_vec());
        router.send(sent.clone());

        let (from, received) = recv_with_timeout(&router, Duration::from_secs(2)).expect("datagram delivered");
        assert_eq!(from, 1);
        assert_eq!(received, sent);
    }

    #[test]
    fn default_loopback_table_drops_non_self_destination() {
        // S2: a router with no explicit routing table (the default
        // `LoopbackRoutingTable`) and an empty link manager must drop a
        // datagram addressed to anyone but itself.
        let manager: Arc<dyn LinkManager> = Arc::new(RouterLinkManager::new());
        let router = DatagramRouter::new(1, manager);

        router.send(Datagram::new(1, 1, 2, b"unreachable test".to_vec()));

        assert!(recv_with_timeout(&router, Duration::from_millis(200)).is_none());

        // The router is still alive and correct for self-addressed traffic.
        router.send(Datagram::new(13, 1, 1, b"test".to_vec()));
        let (from, received) = recv_with_timeout(&router, Duration::from_secs(2)).expect("self-addressed datagram delivered");
        assert_eq!(from, 1);
        assert_eq!(received.data, b"test");
    }

    #[test]
    fn unroutable_destination_is_dropped_not_delivered() {
        let manager: Arc<dyn LinkManager> = Arc::new(RouterLinkManager::new());
        let routing_table: Box<dyn RoutingTable> = Box::new(LocalRoutingTable::new(1, manager.clone()));
        let router = DatagramRouter::with_routing_table(1, manager, routing_table);

        router.send(Datagram::new(10, 1, 42, b"nowhere".to_vec()));

        assert!(recv_with_timeout(&router, Duration::from_millis(200)).is_none());
    }

    fn connected_pair(name_a: u32, name_b: u32) -> (DatagramRouter, DatagramRouter) {
        let (link_a, link_b) = DuplexLink::pair();

        let router_link_manager_a = Arc::new(RouterLinkManager::new());
        let router_link_manager_b = Arc::new(RouterLinkManager::new());
        router_link_manager_a.add_link(name_b, Arc::new(link_a));
        router_link_manager_b.add_link(name_a, Arc::new(link_b));

        let table_a: Box<dyn RoutingTable> = Box::new(LocalRoutingTable::new(name_a, router_link_manager_a.clone()));
        let table_b: Box<dyn RoutingTable> = Box::new(LocalRoutingTable::new(name_b, router_link_manager_b.clone()));

        (
            DatagramRouter::with_routing_table(name_a, router_link_manager_a, table_a),
            DatagramRouter::with_routing_table(name_b, router_link_manager_b, table_b),
        )
    }

    #[test]
    fn two_routers_forward_across_a_link() {
        let (router_a, router_b) = connected_pair(1, 2);

        let sent = Datagram::new(99, 1, 2, b"across the wire".to_vec());
        router_a.send(sent.clone());

        let (from, received) = recv_with_timeout(&router_b, Duration::from_secs(2)).expect("delivered at router_b");
        assert_eq!(from, 1);
        assert_eq!(received, sent);
        assert_ne!(received.time, sent.time, "time is refreshed on the hop");

        router_a.terminate();
        router_b.terminate();
    }

    #[test]
    fn large_payload_is_delivered_byte_for_byte() {
        let (router_a, router_b) = connected_pair(1, 2);

        let payload: Vec<u8> = (0..=255u8).cycle().take(1280).collect();
        let sent = Datagram::new(1, 1, 2, payload);
        router_a.send(sent.clone());

        let (_from, received) = recv_with_timeout(&router_b, Duration::from_secs(2)).expect("large datagram delivered");
        assert_eq!(received.data, sent.data);

        router_a.terminate();
        router_b.terminate();
    }

    #[test]
    fn corrupt_frame_is_dropped_and_does_not_block_later_traffic() {
        let (link_a, link_b) = DuplexLink::pair();

        let router_link_manager_b = Arc::new(RouterLinkManager::new());
        router_link_manager_b.add_link(1, Arc::new(link_b));

        let table_b: Box<dyn RoutingTable> = Box::new(LocalRoutingTable::new(2, router_link_manager_b.clone()));
        let router_b = DatagramRouter::with_routing_table(2, router_link_manager_b, table_b);

        // Simulate a framing-layer glitch by dropping raw, non-datagram
        // bytes straight onto the link, bypassing the encoder entirely.
        link_a.send(b"raw test!".to_vec());

        let encoded = Datagram::new(1, 1, 2, b"still works".to_vec()).encode();
        link_a.send(encoded);

        let (_from, received) = recv_with_timeout(&router_b, Duration::from_secs(2)).expect("well-formed datagram survives a corrupt neighbor");
        assert_eq!(received.data, b"still works");

        router_b.terminate();
    }

    #[test]
    fn config_override_speeds_up_two_router_round_trip() {
        // S7: overriding the scheduling quantum to a smaller value must
        // actually reach both workers' sleep calls, not just the router
        // that happens to construct last. Compared against a deliberately
        // large quantum rather than the crate default, so the two phases
        // are far enough apart to be robust to scheduling jitter.
        use std::env;

        const ENV_VAR: &str = "PACKETMESH_THREAD_SLEEP_MS";

        env::set_var(ENV_VAR, "200");
        let (slow_a, slow_b) = connected_pair(1, 2);
        let start = std::time::Instant::now();
        slow_a.send(Datagram::new(1, 1, 2, b"slow".to_vec()));
        recv_with_timeout(&slow_b, Duration::from_secs(5)).expect("delivered under the slow quantum");
        let slow_elapsed = start.elapsed();
        slow_a.terminate();
        slow_b.terminate();

        env::set_var(ENV_VAR, "1");
        let (fast_a, fast_b) = connected_pair(3, 4);
        let start = std::time::Instant::now();
        fast_a.send(Datagram::new(1, 3, 4, b"fast".to_vec()));
        recv_with_timeout(&fast_b, Duration::from_secs(5)).expect("delivered under the fast quantum");
        let fast_elapsed = start.elapsed();
        fast_a.terminate();
        fast_b.terminate();

        env::remove_var(ENV_VAR);

        assert!(
            fast_elapsed < slow_elapsed,
            "override did not reach both workers: fast={:?}, slow={:?}",
            fast_elapsed,
            slow_elapsed
        );
    }

    #[test]
    #[should_panic(expected = "terminated")]
    fn send_after_terminate_panics() {
        let manager: Arc<dyn LinkManager> = Arc::new(RouterLinkManager::new());
        let router = DatagramRouter::new(1, manager);
        router.terminate();
        router.send(Datagram::new(1, 1, 1, vec![]));
    }

    #[test]
    fn terminate_is_idempotent() {
        let manager: Arc<dyn LinkManager> = Arc::new(RouterLinkManager::new());
        let router = DatagramRouter::new(1, manager);
        router.terminate();
        router.terminate();
    }
}
