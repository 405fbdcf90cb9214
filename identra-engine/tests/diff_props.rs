//! Property coverage for the snapshot diff: totality over the union of
//! entities and agreement with the per-resource set rules.

use identra_engine::{diff, ResourceOp, Snapshot};
use identra_types::{EntityKey, ResourceKey};
use proptest::prelude::*;
use std::collections::BTreeSet;

const POOL: [&str; 4] = ["ldap", "ad", "scim", "db"];
const ENTITIES: usize = 3;

fn side() -> impl Strategy<Value = Vec<BTreeSet<ResourceKey>>> {
    proptest::collection::vec(
        proptest::collection::btree_set(0usize..POOL.len(), 0..=POOL.len())
            .prop_map(|set| set.into_iter().map(|i| ResourceKey::from(POOL[i])).collect()),
        ENTITIES,
    )
}

proptest! {
    #[test]
    fn every_changed_pair_gets_exactly_the_right_op(
        before_sets in side(),
        after_sets in side(),
    ) {
        let keys: Vec<EntityKey> = (0..ENTITIES).map(|_| EntityKey::new()).collect();
        let before: Snapshot = keys.iter().copied().zip(before_sets).collect();
        let after: Snapshot = keys.iter().copied().zip(after_sets).collect();

        let plan = diff(&before, &after);

        for key in &keys {
            let b = &before[key];
            let a = &after[key];
            for resource in POOL {
                let resource = ResourceKey::from(resource);
                let expected = match (b.contains(&resource), a.contains(&resource)) {
                    _ if a == b => None,
                    (false, true) => Some(ResourceOp::Add),
                    (true, false) => Some(ResourceOp::Delete),
                    (true, true) => Some(ResourceOp::Update),
                    (false, false) => None,
                };
                prop_assert_eq!(plan.op_for(key, &resource), expected);
            }
        }
    }

    #[test]
    fn identical_snapshots_always_diff_to_nothing(sets in side()) {
        let keys: Vec<EntityKey> = (0..ENTITIES).map(|_| EntityKey::new()).collect();
        let snapshot: Snapshot = keys.iter().copied().zip(sets).collect();
        prop_assert!(diff(&snapshot, &snapshot).is_empty());
    }
}
