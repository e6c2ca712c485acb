pub mod error;
pub mod packet;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

use log::{info, warn};

use crate::clock::now_seconds;
use crate::config::Config;
use crate::router::DatagramRouter;
use crate::service::packet::{datagram_to_packet, packet_to_datagram, Packet};

/// Upper bound on egress drain rounds per worker iteration, preventing one
/// saturated service from starving the others without ever draining to
/// empty on a busy router.
const MAX_EGRESS_ROUNDS: usize = 100;

struct ServiceMailbox {
    outgoing_rx: Mutex<Receiver<Packet>>,
    incoming_tx: Sender<Packet>,
}

/// A per-router multiplexer sitting above a [`DatagramRouter`]: demuxes
/// inbound datagrams by protocol tag into per-service mailboxes, and muxes
/// outbound packets from each service's send queue back down as datagrams.
pub struct ServiceManager {
    router: Arc<DatagramRouter>,
    services: Arc<Mutex<HashMap<u16, Arc<ServiceMailbox>>>>,
    terminate: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceManager {
    pub fn new(router: Arc<DatagramRouter>) -> Self {
        let services: Arc<Mutex<HashMap<u16, Arc<ServiceMailbox>>>> = Arc::new(Mutex::new(HashMap::new()));
        let terminate = Arc::new(AtomicBool::new(false));
        let config = Config::from_env();

        let worker = {
            let router = router.clone();
            let services = services.clone();
            let terminate = terminate.clone();
            thread::Builder::new()
                .name(format!("service-manager-{}", router.name()))
                .spawn(move || worker_loop(router, services, terminate, config))
                .expect("failed to spawn service manager worker thread")
        };

        ServiceManager {
            router,
            services,
            terminate,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn name(&self) -> u32 {
        self.router.name()
    }

    /// Allocates a mailbox pair for `protocol` and returns the caller-facing
    /// handle. Registering an already-registered protocol is a programmer
    /// error and panics; the existing registration is left untouched.
    pub fn register_service(&self, protocol: u16) -> ServiceHandle {
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<Packet>();
        let (incoming_tx, incoming_rx) = mpsc::channel::<Packet>();

        let mut services = self.services.lock().unwrap();
        if services.contains_key(&protocol) {
            panic!("protocol {} is already registered on router {}", protocol, self.name());
        }
        services.insert(protocol, Arc::new(ServiceMailbox { outgoing_rx: Mutex::new(outgoing_rx), incoming_tx }));
        drop(services);

        info!("service manager {}: registered protocol {}", self.name(), protocol);

        ServiceHandle {
            router_name: self.name(),
            outgoing_tx,
            incoming_rx: Mutex::new(incoming_rx),
        }
    }

    /// Signals the worker to stop and waits for it to exit. Idempotent.
    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// The caller-facing endpoint returned by [`ServiceManager::register_service`].
/// Owns, jointly with the manager, the two mailbox queues for one protocol.
pub struct ServiceHandle {
    router_name: u32,
    outgoing_tx: Sender<Packet>,
    incoming_rx: Mutex<Receiver<Packet>>,
}

impl ServiceHandle {
    /// Queues a packet for transmission. Panics if the owning manager has
    /// terminated.
    pub fn send(&self, packet: Packet) {
        self.outgoing_tx
            .send(packet)
            .expect("send() called on a ServiceHandle whose ServiceManager has terminated");
    }

    /// Pops the next packet addressed to this service, if any.
    pub fn receive(&self, block: bool) -> Option<Packet> {
        let inbox = self.incoming_rx.lock().unwrap();
        if block {
            inbox.recv().ok()
        } else {
            inbox.try_recv().ok()
        }
    }

    /// Convenience wrapper over `send`: builds a `Packet` from raw bytes,
    /// using this handle's own router name as `src` and as the placeholder
    /// `delivered_from` (meaningless until the remote side decodes it).
    pub fn send_data(&self, dest: u32, data: Vec<u8>) {
        self.send(Packet {
            src: self.router_name,
            dest,
            data,
            delivered_from: self.router_name,
            time: now_seconds(),
        });
    }

    /// Convenience wrapper over `receive`: destructures the received
    /// `Packet` into its originating router and payload.
    pub fn receive_data(&self, block: bool) -> Option<(u32, Vec<u8>)> {
        self.receive(block).map(|packet| (packet.src, packet.data))
    }
}

fn worker_loop(
    router: Arc<DatagramRouter>,
    services: Arc<Mutex<HashMap<u16, Arc<ServiceMailbox>>>>,
    terminate: Arc<AtomicBool>,
    config: Config,
) {
    let name = router.name();
    info!("service manager {}: worker thread started", name);

    loop {
        if terminate.load(Ordering::SeqCst) {
            break;
        }

        let snapshot: HashMap<u16, Arc<ServiceMailbox>> = services.lock().unwrap().clone();

        for _round in 0..MAX_EGRESS_ROUNDS {
            let mut sent_any = false;
            for (protocol, mailbox) in &snapshot {
                if let Ok(packet) = mailbox.outgoing_rx.lock().unwrap().try_recv() {
                    router.send(packet_to_datagram(*protocol, &packet));
                    sent_any = true;
                }
            }
            if !sent_any {
                break;
            }
        }

        while let Some((from, datagram)) = router.receive(false) {
            match snapshot.get(&datagram.protocol) {
                Some(mailbox) => match datagram_to_packet(from, &datagram) {
                    Ok(packet) => {
                        let _ = mailbox.incoming_tx.send(packet);
                    }
                    Err(err) => {
                        warn!(
                            "service manager {}: dropped invalid tunneled packet on protocol {}: {}",
                            name, datagram.protocol, err
                        );
                    }
                },
                None => {
                    warn!(
                        "service manager {}: dropped datagram for unregistered protocol {}",
                        name, datagram.protocol
                    );
                }
            }
        }

        thread::sleep(config.thread_sleep_time);
    }

    info!("service manager {}: worker thread exiting", name);
}
