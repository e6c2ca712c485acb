//! Wires two routers together over a `DuplexLink` and exchanges a few chat
//! packets through a `ServiceManager` on each side, printing traffic as it
//! arrives. Not part of the library's compatibility surface.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use packetmesh::router::link::{DuplexLink, LinkManager, RouterLinkManager};
use packetmesh::router::routing_table::{LocalRoutingTable, RoutingTable};
use packetmesh::router::DatagramRouter;
use packetmesh::service::ServiceManager;

const CHAT_PROTOCOL: u16 = 77;

fn main() {
    env_logger::init();

    let (link_a, link_b) = DuplexLink::pair();

    let link_manager_a = Arc::new(RouterLinkManager::new());
    let link_manager_b = Arc::new(RouterLinkManager::new());
    link_manager_a.add_link(2, Arc::new(link_a));
    link_manager_b.add_link(1, Arc::new(link_b));

    let table_a: Box<dyn RoutingTable> = Box::new(LocalRoutingTable::new(1, link_manager_a.clone() as Arc<dyn LinkManager>));
    let table_b: Box<dyn RoutingTable> = Box::new(LocalRoutingTable::new(2, link_manager_b.clone() as Arc<dyn LinkManager>));

    let router_a = Arc::new(DatagramRouter::with_routing_table(1, link_manager_a, table_a));
    let router_b = Arc::new(DatagramRouter::with_routing_table(2, link_manager_b, table_b));

    let services_a = ServiceManager::new(router_a.clone());
    let services_b = ServiceManager::new(router_b.clone());

    let chat_a = services_a.register_service(CHAT_PROTOCOL);
    let chat_b = services_b.register_service(CHAT_PROTOCOL);

    chat_a.send_data(2, b"hello from router 1".to_vec());
    chat_b.send_data(1, b"hello back from router 2".to_vec());

    if let Some((src, data)) = chat_b.receive_data(true) {
        println!("router 2 received from {}: {}", src, String::from_utf8_lossy(&data));
    }
    if let Some((src, data)) = chat_a.receive_data(true) {
        println!("router 1 received from {}: {}", src, String::from_utf8_lossy(&data));
    }

    thread::sleep(Duration::from_millis(50));
    services_a.terminate();
    services_b.terminate();
    router_a.terminate();
    router_b.terminate();
}
