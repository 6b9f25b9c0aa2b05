mod common;

use std::sync::Arc;

use serde_json::json;

use tableside_gateway::gateway::bus::{MemoryBus, PubSubBus};
use tableside_gateway::gateway::fanout::BridgeState;

use common::{assert_silent, connect, eventually, join, mint_token, recv_json, start_gateway};

#[tokio::test]
async fn event_reaches_both_instances_exactly_once() {
    let bus: Arc<dyn PubSubBus> = Arc::new(MemoryBus::new());
    let (addr_a, gateway_a) = start_gateway(Some(bus.clone())).await;
    let (addr_b, gateway_b) = start_gateway(Some(bus)).await;
    assert_ne!(gateway_a.instance_id, gateway_b.instance_id);

    let (mut client_a, _) = connect(addr_a, Some(&mint_token("staff"))).await;
    let (mut client_b, _) = connect(addr_b, Some(&mint_token("manager"))).await;
    join(&mut client_a, json!("42")).await;
    join(&mut client_b, json!("42")).await;

    gateway_a
        .emitter
        .queue_entry_added("42", &json!({ "id": "q1", "party": 2 }));

    let on_a = recv_json(&mut client_a).await;
    let on_b = recv_json(&mut client_b).await;
    assert_eq!(on_a, on_b);
    assert_eq!(on_a["event"], "queue.entry_added");
    assert_eq!(on_a["meta"]["instanceId"], gateway_a.instance_id.as_str());

    // A's own publication comes back over the bus and must be dropped.
    assert_silent(&mut client_a).await;
    assert_silent(&mut client_b).await;
}

#[tokio::test]
async fn remote_events_only_reach_the_matching_room() {
    let bus: Arc<dyn PubSubBus> = Arc::new(MemoryBus::new());
    let (_addr_a, gateway_a) = start_gateway(Some(bus.clone())).await;
    let (addr_b, _gateway_b) = start_gateway(Some(bus)).await;

    let (mut in_42, _) = connect(addr_b, Some(&mint_token("staff"))).await;
    let (mut in_7, _) = connect(addr_b, Some(&mint_token("staff"))).await;
    join(&mut in_42, json!("42")).await;
    join(&mut in_7, json!("7")).await;

    gateway_a.emitter.order_deleted("42", "o9");

    assert_eq!(recv_json(&mut in_42).await["data"], json!({ "orderId": "o9" }));
    assert_silent(&mut in_7).await;
}

#[tokio::test]
async fn closed_bus_at_startup_leaves_gateway_local_only() {
    let memory = Arc::new(MemoryBus::new());
    memory.close();
    let bus: Arc<dyn PubSubBus> = memory;
    let (addr, gateway) = start_gateway(Some(bus)).await;
    assert!(gateway.bridge.is_none());

    let (mut ws, _) = connect(addr, Some(&mint_token("staff"))).await;
    join(&mut ws, json!("42")).await;
    gateway.emitter.order_updated("42", &json!({ "id": "o1" }));
    assert_eq!(recv_json(&mut ws).await["event"], "order.updated");
}

#[tokio::test]
async fn lost_bus_keeps_local_delivery_working() {
    let memory = Arc::new(MemoryBus::new());
    let bus: Arc<dyn PubSubBus> = memory.clone();
    let (addr, gateway) = start_gateway(Some(bus)).await;
    let bridge = gateway.bridge.clone().expect("bridge started");
    assert_eq!(bridge.state(), BridgeState::Active);

    memory.close();
    assert!(eventually(|| bridge.state() == BridgeState::Disabled).await);

    let (mut ws, _) = connect(addr, Some(&mint_token("staff"))).await;
    join(&mut ws, json!("42")).await;
    gateway.emitter.order_created("42", &json!({ "id": "o2" }));
    assert_eq!(recv_json(&mut ws).await["data"]["order"]["id"], "o2");
    assert_silent(&mut ws).await;
}
