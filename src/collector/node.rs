// Node metrics collector
//
// Same classification scheme as jobs (priority-ordered base buckets plus
// independent flags) over the node state list, plus flat per-node resource
// tallies. Alongside the cluster aggregate, collection keeps a per-node
// tally map so the exposition can attach a `node` label.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use prometheus::Registry;
use tracing::debug;

use crate::client::types::{Node, NodeState};
use crate::client::{ClientError, SlurmClient};

use super::{register_gauge, register_gauge_per_key, Collector, CollectorError};

/// One scrape's aggregated node metrics.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NodeMetrics {
    pub node_count: u64,
    pub node_states: NodeStates,
    pub node_tres: NodeTres,
    /// Per-node tallies keyed by node name, for labeled exposition.
    pub node_tres_per: HashMap<String, NodeTres>,
}

/// State bucket counters for nodes.
///
/// Ref: https://slurm.schedmd.com/sinfo.html#SECTION_NODE-STATE-CODES
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NodeStates {
    /// Nodes processed, regardless of classification outcome.
    pub total: u64,
    // Base states
    pub allocated: u64,
    pub down: u64,
    pub error: u64,
    pub future: u64,
    pub idle: u64,
    pub mixed: u64,
    pub unknown: u64,
    // Flag states
    pub completing: u64,
    pub drain: u64,
    pub fail: u64,
    pub maintenance: u64,
    pub not_responding: u64,
    pub planned: u64,
    pub reboot_requested: u64,
    pub reserved: u64,
}

/// Resource totals for one node or for the whole cluster.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeTres {
    pub total: u64,
    pub cpus_total: u64,
    pub cpus_effective: u64,
    pub cpus_alloc: u64,
    pub cpus_idle: u64,
    pub memory_total: u64,
    pub memory_effective: u64,
    pub memory_alloc: u64,
    pub memory_free: u64,
}

type NodeStateBucket = fn(&mut NodeStates) -> &mut u64;

const NODE_BASE_BUCKETS: &[(NodeState, NodeStateBucket)] = &[
    (NodeState::Allocated, |s| &mut s.allocated),
    (NodeState::Down, |s| &mut s.down),
    (NodeState::Error, |s| &mut s.error),
    (NodeState::Future, |s| &mut s.future),
    (NodeState::Idle, |s| &mut s.idle),
    (NodeState::Mixed, |s| &mut s.mixed),
    (NodeState::Unknown, |s| &mut s.unknown),
];

const NODE_FLAG_BUCKETS: &[(NodeState, NodeStateBucket)] = &[
    (NodeState::Completing, |s| &mut s.completing),
    (NodeState::Drain, |s| &mut s.drain),
    (NodeState::Fail, |s| &mut s.fail),
    (NodeState::Maintenance, |s| &mut s.maintenance),
    (NodeState::NotResponding, |s| &mut s.not_responding),
    (NodeState::Planned, |s| &mut s.planned),
    (NodeState::RebootRequested, |s| &mut s.reboot_requested),
    (NodeState::Reserved, |s| &mut s.reserved),
];

/// Classifies one node into the running bucket counters. Never fails.
pub fn classify_node(states: &mut NodeStates, node: &Node) {
    states.total += 1;
    let tokens = node.states();

    for (token, bucket) in NODE_BASE_BUCKETS {
        if tokens.contains(token) {
            *bucket(states) += 1;
            break;
        }
    }
    for (token, bucket) in NODE_FLAG_BUCKETS {
        if tokens.contains(token) {
            *bucket(states) += 1;
        }
    }
}

/// Adds one node's resource fields into the running tallies.
///
/// Unset fields contribute zero. Idle CPUs come from the source field when
/// reported, otherwise they are derived as effective minus allocated.
/// Effective memory is real memory minus the specialized reservation.
pub fn tally_node(tres: &mut NodeTres, node: &Node) {
    tres.total += 1;

    let effective = node.effective_cpus.unwrap_or(0);
    let alloc = node.alloc_cpus.unwrap_or(0);
    tres.cpus_total += node.cpus.unwrap_or(0);
    tres.cpus_effective += effective;
    tres.cpus_alloc += alloc;
    tres.cpus_idle += node
        .alloc_idle_cpus
        .unwrap_or_else(|| effective.saturating_sub(alloc));

    let memory = node.real_memory.unwrap_or(0);
    tres.memory_total += memory;
    tres.memory_effective += memory.saturating_sub(node.specialized_memory.unwrap_or(0));
    tres.memory_alloc += node.alloc_memory.unwrap_or(0);
    tres.memory_free += node.free_mem.map(|m| m.value()).unwrap_or(0);
}

/// Folds a node list into one snapshot, keeping a per-node tally map next
/// to the aggregate. Order-independent; the map is keyed, not ordered.
pub fn aggregate_nodes(nodes: &[Node]) -> NodeMetrics {
    let mut metrics = NodeMetrics {
        node_count: nodes.len() as u64,
        ..Default::default()
    };
    for node in nodes {
        classify_node(&mut metrics.node_states, node);
        tally_node(&mut metrics.node_tres, node);
        if let Some(name) = &node.name {
            let per = metrics.node_tres_per.entry(name.clone()).or_default();
            tally_node(per, node);
        }
    }
    metrics
}

const NODE_STATE_GAUGES: &[(&str, &str, fn(&NodeStates) -> u64)] = &[
    ("slurm_nodes_allocated_total", "Number of nodes in Allocated state", |s| s.allocated),
    ("slurm_nodes_down_total", "Number of nodes in Down state", |s| s.down),
    ("slurm_nodes_error_total", "Number of nodes in Error state", |s| s.error),
    ("slurm_nodes_future_total", "Number of nodes in Future state", |s| s.future),
    ("slurm_nodes_idle_total", "Number of nodes in Idle state", |s| s.idle),
    ("slurm_nodes_mixed_total", "Number of nodes in Mixed state", |s| s.mixed),
    ("slurm_nodes_unknown_total", "Number of nodes in Unknown state", |s| s.unknown),
    ("slurm_nodes_completing_total", "Number of nodes with Completing flag", |s| s.completing),
    ("slurm_nodes_drain_total", "Number of nodes with Drain flag", |s| s.drain),
    ("slurm_nodes_fail_total", "Number of nodes with Fail flag", |s| s.fail),
    ("slurm_nodes_maintenance_total", "Number of nodes with Maintenance flag", |s| {
        s.maintenance
    }),
    ("slurm_nodes_notresponding_total", "Number of nodes with NotResponding flag", |s| {
        s.not_responding
    }),
    ("slurm_nodes_planned_total", "Number of nodes with Planned flag", |s| s.planned),
    ("slurm_nodes_rebootrequested_total", "Number of nodes with RebootRequested flag", |s| {
        s.reboot_requested
    }),
    ("slurm_nodes_reserved_total", "Number of nodes with Reserved flag", |s| s.reserved),
];

const NODE_TRES_GAUGES: &[(&str, &str, fn(&NodeTres) -> u64)] = &[
    ("slurm_nodes_cpus_total", "Total number of CPUs among nodes", |t| t.cpus_total),
    ("slurm_nodes_cpus_effective_total", "Number of effective CPUs among nodes", |t| {
        t.cpus_effective
    }),
    ("slurm_nodes_cpus_alloc_total", "Number of allocated CPUs among nodes", |t| t.cpus_alloc),
    ("slurm_nodes_cpus_idle_total", "Number of idle CPUs among nodes", |t| t.cpus_idle),
    ("slurm_nodes_memory_total_bytes", "Total amount of memory (MB) among nodes", |t| {
        t.memory_total
    }),
    ("slurm_nodes_memory_effective_bytes", "Amount of effective memory (MB) among nodes", |t| {
        t.memory_effective
    }),
    ("slurm_nodes_memory_alloc_bytes", "Amount of allocated memory (MB) among nodes", |t| {
        t.memory_alloc
    }),
    ("slurm_nodes_memory_free_bytes", "Amount of free memory (MB) among nodes", |t| {
        t.memory_free
    }),
];

// Per-node variants of the tres families, labeled by node name.
const NODE_TRES_PER_GAUGES: &[(&str, &str, fn(&NodeTres) -> u64)] = &[
    ("slurm_node_cpus_total", "Total number of CPUs on the node", |t| t.cpus_total),
    ("slurm_node_cpus_effective_total", "Number of effective CPUs on the node", |t| {
        t.cpus_effective
    }),
    ("slurm_node_cpus_alloc_total", "Number of allocated CPUs on the node", |t| t.cpus_alloc),
    ("slurm_node_cpus_idle_total", "Number of idle CPUs on the node", |t| t.cpus_idle),
    ("slurm_node_memory_total_bytes", "Total amount of memory (MB) on the node", |t| {
        t.memory_total
    }),
    ("slurm_node_memory_effective_bytes", "Amount of effective memory (MB) on the node", |t| {
        t.memory_effective
    }),
    ("slurm_node_memory_alloc_bytes", "Amount of allocated memory (MB) on the node", |t| {
        t.memory_alloc
    }),
    ("slurm_node_memory_free_bytes", "Amount of free memory (MB) on the node", |t| {
        t.memory_free
    }),
];

/// Collector for node metrics.
pub struct NodeCollector {
    client: Arc<dyn SlurmClient>,
}

impl NodeCollector {
    pub fn new(client: Arc<dyn SlurmClient>) -> Self {
        NodeCollector { client }
    }

    async fn metrics(&self) -> Result<NodeMetrics, ClientError> {
        let nodes = self.client.list_nodes().await?;
        Ok(aggregate_nodes(&nodes))
    }
}

#[async_trait]
impl Collector for NodeCollector {
    fn name(&self) -> &'static str {
        "nodes"
    }

    async fn collect(&self, registry: &Registry) -> Result<(), CollectorError> {
        debug!("collecting node metrics");
        let metrics = self.metrics().await?;

        register_gauge(
            registry,
            "slurm_nodes_total",
            "Total number of nodes",
            metrics.node_count,
        )?;
        for &(name, help, field) in NODE_STATE_GAUGES {
            register_gauge(registry, name, help, field(&metrics.node_states))?;
        }
        for &(name, help, field) in NODE_TRES_GAUGES {
            register_gauge(registry, name, help, field(&metrics.node_tres))?;
        }
        for &(name, help, field) in NODE_TRES_PER_GAUGES {
            register_gauge_per_key(
                registry,
                name,
                help,
                "node",
                metrics
                    .node_tres_per
                    .iter()
                    .map(|(node, tres)| (node.as_str(), field(tres))),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use crate::collector::fixtures;

    fn node_with_states(states: Vec<NodeState>) -> Node {
        Node {
            state: Some(states),
            ..Default::default()
        }
    }

    #[test]
    fn classify_single_base_states() {
        let cases: &[(NodeState, fn(&NodeStates) -> u64)] = &[
            (NodeState::Allocated, |s| s.allocated),
            (NodeState::Down, |s| s.down),
            (NodeState::Error, |s| s.error),
            (NodeState::Future, |s| s.future),
            (NodeState::Idle, |s| s.idle),
            (NodeState::Mixed, |s| s.mixed),
            (NodeState::Unknown, |s| s.unknown),
        ];
        for (token, bucket) in cases {
            let mut states = NodeStates::default();
            classify_node(&mut states, &node_with_states(vec![*token]));
            assert_eq!(bucket(&states), 1, "base bucket for {token:?}");
            assert_eq!(states.total, 1);
        }
    }

    #[test]
    fn classify_all_states_all_flags_picks_one_base() {
        let node = node_with_states(vec![
            NodeState::Allocated,
            NodeState::Cloud,
            NodeState::Completing,
            NodeState::Down,
            NodeState::Drain,
            NodeState::DynamicFuture,
            NodeState::DynamicNorm,
            NodeState::Error,
            NodeState::Fail,
            NodeState::Future,
            NodeState::Idle,
            NodeState::Invalid,
            NodeState::InvalidReg,
            NodeState::Maintenance,
            NodeState::Mixed,
            NodeState::NotResponding,
            NodeState::Planned,
            NodeState::PowerDown,
            NodeState::PowerDrain,
            NodeState::PoweredDown,
            NodeState::PoweringDown,
            NodeState::PoweringUp,
            NodeState::PowerUp,
            NodeState::RebootCanceled,
            NodeState::RebootIssued,
            NodeState::RebootRequested,
            NodeState::Reserved,
            NodeState::Resume,
            NodeState::Undrain,
            NodeState::Unknown,
        ]);
        let mut states = NodeStates::default();
        classify_node(&mut states, &node);
        assert_eq!(
            states,
            NodeStates {
                total: 1,
                allocated: 1,
                completing: 1,
                drain: 1,
                fail: 1,
                maintenance: 1,
                not_responding: 1,
                planned: 1,
                reboot_requested: 1,
                reserved: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn classify_empty_node_counts_only_total() {
        let mut states = NodeStates::default();
        classify_node(&mut states, &Node::default());
        assert_eq!(
            states,
            NodeStates {
                total: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    fn tally_single_nodes() {
        let mut tres = NodeTres::default();
        tally_node(&mut tres, &Node::default());
        assert_eq!(
            tres,
            NodeTres {
                total: 1,
                ..Default::default()
            }
        );

        let mut tres = NodeTres::default();
        tally_node(&mut tres, &fixtures::node0());
        assert_eq!(
            tres,
            NodeTres {
                total: 1,
                cpus_total: 16,
                cpus_effective: 14,
                cpus_alloc: 0,
                cpus_idle: 16,
                memory_total: 4096,
                memory_effective: 3072,
                memory_alloc: 0,
                memory_free: 4096,
            }
        );

        let mut tres = NodeTres::default();
        tally_node(&mut tres, &fixtures::node3());
        assert_eq!(
            tres,
            NodeTres {
                total: 1,
                cpus_total: 6,
                cpus_effective: 6,
                cpus_alloc: 4,
                cpus_idle: 2,
                memory_total: 1024,
                memory_effective: 1024,
                memory_alloc: 800,
                memory_free: 224,
            }
        );
    }

    #[test]
    fn tally_derives_idle_when_not_reported() {
        let node = Node {
            effective_cpus: Some(10),
            alloc_cpus: Some(3),
            ..Default::default()
        };
        let mut tres = NodeTres::default();
        tally_node(&mut tres, &node);
        assert_eq!(tres.cpus_idle, 7);
    }

    #[tokio::test]
    async fn metrics_from_test_data() {
        let client = Arc::new(FakeClient::new().with_nodes(fixtures::nodes()));
        let collector = NodeCollector::new(client);
        let metrics = collector.metrics().await.unwrap();

        assert_eq!(metrics.node_count, 4);
        assert_eq!(
            metrics.node_states,
            NodeStates {
                total: 4,
                allocated: 2,
                idle: 1,
                mixed: 1,
                completing: 1,
                drain: 1,
                ..Default::default()
            }
        );
        assert_eq!(
            metrics.node_tres,
            NodeTres {
                total: 4,
                cpus_total: 46,
                cpus_effective: 44,
                cpus_alloc: 28,
                cpus_idle: 18,
                memory_total: 11264,
                memory_effective: 10240,
                memory_alloc: 5800,
                memory_free: 5464,
            }
        );

        let per = &metrics.node_tres_per;
        assert_eq!(per.len(), 4);
        assert_eq!(per["node1"].cpus_alloc, 8);
        assert_eq!(per["node1"].memory_free, 48);
        assert_eq!(per["node2"].memory_alloc, 3000);
        assert_eq!(per["node3"].cpus_idle, 2);
    }

    #[tokio::test]
    async fn metrics_are_idempotent_for_unchanged_list() {
        let client = Arc::new(FakeClient::new().with_nodes(fixtures::nodes()));
        let collector = NodeCollector::new(client);
        let first = collector.metrics().await.unwrap();
        let second = collector.metrics().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn collect_registers_labeled_families() {
        let client = Arc::new(FakeClient::new().with_nodes(fixtures::nodes()));
        let collector = NodeCollector::new(client);
        let registry = Registry::new();
        collector.collect(&registry).await.unwrap();

        let families = registry.gather();
        // count + 15 state buckets + 8 aggregate tres + 8 per-node families
        assert_eq!(families.len(), 32);
        let per_node = families
            .iter()
            .find(|f| f.get_name() == "slurm_node_cpus_total")
            .unwrap();
        assert_eq!(per_node.get_metric().len(), 4);
    }

    #[tokio::test]
    async fn collect_emits_nothing_on_read_failure() {
        let client = Arc::new(FakeClient::new().failing());
        let collector = NodeCollector::new(client);
        let registry = Registry::new();
        assert!(collector.collect(&registry).await.is_err());
        assert!(registry.gather().is_empty());
    }
}
