//! Summary statistics over a materialized tree.

use crate::schema::{NetworkNode, NetworkStats};

/// Walk an already-materialized tree once and tally member count, deepest
/// level, and total points. Pure: no store access, same tree in, same
/// stats out, regardless of child order.
pub fn aggregate(root: &NetworkNode) -> NetworkStats {
    let mut stats = NetworkStats {
        total_members: 0,
        max_level: 0,
        total_points: 0,
    };
    walk(root, &mut stats);
    stats
}

fn walk(node: &NetworkNode, stats: &mut NetworkStats) {
    stats.total_members += 1;
    stats.total_points += node.record.points;
    stats.max_level = stats.max_level.max(node.level);
    for child in node.children.values() {
        walk(child, stats);
    }
}

#[cfg(test)]
mod tests {
    use refnet_store::UserRecord;

    use super::*;

    fn node(id: &str, level: u32, points: u64) -> NetworkNode {
        let mut record = UserRecord::new(id, format!("{id}@example.com"), "CODE", None);
        record.points = points;
        NetworkNode::new(id, level, record)
    }

    fn sample_tree() -> NetworkNode {
        let mut root = node("a", 0, 0);
        let mut b = node("b", 1, 5);
        b.children.insert("d".into(), node("d", 2, 0));
        root.children.insert("b".into(), b);
        root.children.insert("c".into(), node("c", 1, 3));
        root
    }

    #[test]
    fn test_aggregate_sample() {
        let stats = aggregate(&sample_tree());
        assert_eq!(
            stats,
            NetworkStats {
                total_members: 4,
                max_level: 2,
                total_points: 8,
            }
        );
    }

    #[test]
    fn test_single_node() {
        let stats = aggregate(&node("solo", 0, 42));
        assert_eq!(stats.total_members, 1);
        assert_eq!(stats.max_level, 0);
        assert_eq!(stats.total_points, 42);
    }

    #[test]
    fn test_child_order_independent() {
        // Rebuild the same tree inserting children in the opposite order;
        // BTreeMap normalizes layout, and the tally must not care anyway.
        let mut root = node("a", 0, 0);
        root.children.insert("c".into(), node("c", 1, 3));
        let mut b = node("b", 1, 5);
        b.children.insert("d".into(), node("d", 2, 0));
        root.children.insert("b".into(), b);

        assert_eq!(aggregate(&root), aggregate(&sample_tree()));
    }
}
