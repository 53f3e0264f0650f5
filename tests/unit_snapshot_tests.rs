//! # Snapshot Unit Tests / 快照单元测试
//!
//! 验证快照的先序编号、路径查找、同一性判断以及 JSON 序列化。

mod common;

use common::*;
use matrix_harness::core::models::{Bug, ItemKind};
use matrix_harness::core::snapshot::{NodeId, Snapshot};

fn sample() -> Snapshot {
    let (_, snapshot) = tree_and_snapshot(
        module("Suite")
            .with_child(
                case(1, "Network")
                    .with_bug(Bug::new("NET-3"))
                    .with_child(variation(1, "tcp"))
                    .with_child(variation(2, "udp")),
            )
            .with_child(case(2, "Storage").with_child(variation(1, "disk"))),
    );
    (*snapshot).clone()
}

#[cfg(test)]
mod addressing_tests {
    use super::*;

    #[test]
    fn test_nodes_are_numbered_in_pre_order() {
        let snapshot = sample();
        assert_eq!(snapshot.len(), 6);
        assert_eq!(snapshot.root(), NodeId(0));
        assert_eq!(snapshot.children(NodeId(0)), &[NodeId(1), NodeId(4)]);
        assert_eq!(snapshot.children(NodeId(1)), &[NodeId(2), NodeId(3)]);
        assert_eq!(snapshot.parent(NodeId(5)), Some(NodeId(4)));
        assert_eq!(snapshot[NodeId(0)].kind, ItemKind::Module);
        assert!(snapshot.is_case(NodeId(4)));
        assert!(snapshot.is_variation(NodeId(2)));
    }

    #[test]
    fn test_variations_and_descendants() {
        let snapshot = sample();
        let variations: Vec<NodeId> = snapshot.variations().collect();
        assert_eq!(variations, vec![NodeId(2), NodeId(3), NodeId(5)]);
        assert_eq!(snapshot.descendants(NodeId(1)), vec![NodeId(2), NodeId(3)]);
        assert_eq!(snapshot.descendants(NodeId(0)).len(), 5);
    }

    #[test]
    fn test_paths_and_lookup() {
        let snapshot = sample();
        assert_eq!(snapshot.path(NodeId(3)), "Suite/Network/udp");
        assert_eq!(snapshot.find("Suite/Storage/disk"), Some(NodeId(5)));
        assert_eq!(snapshot.find("Suite/Storage/ssd"), None);
        assert!(snapshot.get(NodeId(99)).is_none());
    }

    #[test]
    fn test_bugs_are_projected() {
        let snapshot = sample();
        assert_eq!(snapshot[NodeId(2)].bugs, vec![Bug::new("NET-3")]);
        assert!(snapshot[NodeId(5)].bugs.is_empty());
    }
}

#[cfg(test)]
mod identity_tests {
    use super::*;

    #[test]
    fn test_same_item_compares_metadata_chains() {
        let a = sample();
        let b = sample();
        assert!(a.same_item(NodeId(3), &b, NodeId(3)));
        assert!(!a.same_item(NodeId(2), &b, NodeId(3)));
        assert!(!a.same_item(NodeId(2), &b, NodeId(42)));
    }

    #[test]
    fn test_matches_live_items() {
        let (root, snapshot) = tree_and_snapshot(module("Suite").with_child(variation(1, "Leaf")));
        let leaf = root.children().unwrap()[0].clone();
        assert!(snapshot.matches_item(NodeId(0), &root));
        assert!(snapshot.matches_item(NodeId(1), &leaf));
        assert!(!snapshot.matches_item(NodeId(0), &leaf));
    }

    #[test]
    fn test_json_round_trip_preserves_identity() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"Network\""));

        let restored = Snapshot::from_json(&json).unwrap();
        assert_eq!(restored.len(), snapshot.len());
        assert!(restored.same_item(NodeId(5), &snapshot, NodeId(5)));
        assert_eq!(restored.path(NodeId(5)), "Suite/Storage/disk");
    }
}

#[cfg(test)]
mod tampered_json_tests {
    use super::*;
    use serde_json::{Value, json};

    fn tampered(edit: impl FnOnce(&mut Value)) -> String {
        let mut value: Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        edit(&mut value);
        value.to_string()
    }

    #[test]
    fn test_root_with_a_parent_is_rejected() {
        let json = tampered(|v| v["nodes"][0]["parent"] = json!(0));
        let error = Snapshot::from_json(&json).unwrap_err();
        assert!(error.to_string().contains("root has parent"));
    }

    #[test]
    fn test_dangling_child_id_is_rejected() {
        let json = tampered(|v| v["nodes"][1]["children"] = json!([2, 3, 99]));
        assert!(Snapshot::from_json(&json).is_err());
    }

    #[test]
    fn test_parent_that_does_not_list_the_child_is_rejected() {
        let json = tampered(|v| v["nodes"][2]["parent"] = json!(4));
        assert!(Snapshot::from_json(&json).is_err());
    }

    #[test]
    fn test_backward_child_link_is_rejected() {
        let json = tampered(|v| {
            v["nodes"][4]["children"] = json!([1, 5]);
            v["nodes"][1]["parent"] = json!(4);
        });
        assert!(Snapshot::from_json(&json).is_err());
    }

    #[test]
    fn test_variation_with_children_is_rejected() {
        let json = tampered(|v| {
            v["nodes"][2]["children"] = json!([3]);
            v["nodes"][3]["parent"] = json!(2);
        });
        assert!(Snapshot::from_json(&json).is_err());
    }

    #[test]
    fn test_untouched_json_is_accepted() {
        let json = tampered(|_| {});
        assert_eq!(Snapshot::from_json(&json).unwrap().len(), 6);
    }
}
