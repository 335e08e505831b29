use forge_cluster::scheduler::{NodeSelector, NodeSnapshot, NodeStatus};

fn node(id: &str, active_jobs: u32, max_jobs: u32) -> NodeSnapshot {
    NodeSnapshot {
        id: id.to_string(),
        cpu_usage: 50.0,
        memory_usage: 50.0,
        active_jobs,
        max_jobs,
        tags: Vec::new(),
        status: NodeStatus::Online,
    }
}

#[test]
fn test_least_loaded_picks_emptiest_node() {
    let mut selector = NodeSelector::least_loaded();
    selector.update_nodes(vec![
        node("node-1", 5, 5),
        node("node-2", 2, 5),
        node("node-3", 4, 5),
    ]);

    let selected = selector.select_node().unwrap();
    assert_eq!(selected.id, "node-2");
}

#[test]
fn test_offline_node_falls_back_to_next_best() {
    let mut selector = NodeSelector::least_loaded();
    let mut node2 = node("node-2", 2, 5);
    node2.status = NodeStatus::Offline;
    selector.update_nodes(vec![node("node-1", 5, 5), node2, node("node-3", 4, 5)]);

    let selected = selector.select_node().unwrap();
    assert_eq!(selected.id, "node-3");
}

#[test]
fn test_full_node_is_never_selected() {
    let mut selector = NodeSelector::least_loaded();
    let mut idle_but_full = node("node-1", 5, 5);
    idle_but_full.cpu_usage = 0.0;
    idle_but_full.memory_usage = 0.0;
    selector.update_nodes(vec![idle_but_full, node("node-2", 4, 5)]);

    assert_eq!(selector.select_node().unwrap().id, "node-2");
}

#[test]
fn test_no_eligible_node_returns_none() {
    let mut selector = NodeSelector::least_loaded();
    assert!(selector.select_node().is_none());

    let mut offline = node("node-1", 0, 5);
    offline.status = NodeStatus::Offline;
    selector.update_nodes(vec![offline, node("node-2", 5, 5)]);
    assert!(selector.select_node().is_none());
}

#[test]
fn test_cpu_and_memory_break_slot_ties() {
    let mut selector = NodeSelector::least_loaded();
    let mut busy = node("node-1", 2, 5);
    busy.cpu_usage = 90.0;
    busy.memory_usage = 80.0;
    let mut idle = node("node-2", 2, 5);
    idle.cpu_usage = 10.0;
    idle.memory_usage = 20.0;
    selector.update_nodes(vec![busy, idle]);

    assert_eq!(selector.select_node().unwrap().id, "node-2");
}

#[test]
fn test_exact_ties_break_by_node_id() {
    let mut selector = NodeSelector::least_loaded();
    selector.update_nodes(vec![
        node("node-c", 2, 5),
        node("node-a", 2, 5),
        node("node-b", 2, 5),
    ]);

    // Identical load on every node: lowest ID wins, repeatably.
    for _ in 0..3 {
        assert_eq!(selector.select_node().unwrap().id, "node-a");
    }
}

#[test]
fn test_update_nodes_replaces_snapshot() {
    let mut selector = NodeSelector::least_loaded();
    selector.update_nodes(vec![node("node-1", 0, 5)]);
    assert_eq!(selector.select_node().unwrap().id, "node-1");

    selector.update_nodes(vec![node("node-2", 0, 5)]);
    assert_eq!(selector.select_node().unwrap().id, "node-2");
    assert_eq!(selector.nodes().len(), 1);
}

#[test]
fn test_zero_capacity_node_is_ineligible() {
    let mut selector = NodeSelector::least_loaded();
    selector.update_nodes(vec![node("node-1", 0, 0)]);
    assert!(selector.select_node().is_none());
}
