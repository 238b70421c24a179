//! Read-your-writes against a model map
//!
//! Random sequences of sets, clears and range clears are applied both to a
//! transaction over a seeded store and to a plain `BTreeMap`. The
//! transaction's range read and the committed keyspace must match the model.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::executor::block_on;
use proptest::prelude::*;
use stacktester_concurrency::{DatabaseConfig, MemoryDatabase};
use stacktester_core::{read_range, Database, KeySelector, KeyValue, RangeOptions, Transaction};

#[derive(Debug, Clone)]
enum Op {
    Set(u8, u8),
    Clear(u8),
    ClearRange(u8, u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..16, any::<u8>()).prop_map(|(k, v)| Op::Set(k, v)),
        (0u8..16).prop_map(Op::Clear),
        (0u8..16, 0u8..16).prop_map(|(a, b)| Op::ClearRange(a.min(b), a.max(b))),
    ]
}

fn key(k: u8) -> Vec<u8> {
    vec![b'k', k]
}

fn read_all(tr: Arc<dyn Transaction>) -> Vec<KeyValue> {
    block_on(read_range(
        tr,
        KeySelector::first_greater_or_equal(b"k".to_vec()),
        KeySelector::first_greater_or_equal(b"l".to_vec()),
        RangeOptions::default(),
        false,
    ))
    .unwrap()
}

proptest! {
    #[test]
    fn test_merged_view_matches_model(
        seed in proptest::collection::btree_map(0u8..16, any::<u8>(), 0..8),
        ops in proptest::collection::vec(op(), 0..24),
    ) {
        let db: Arc<dyn Database> = Arc::new(MemoryDatabase::new(DatabaseConfig::for_testing()));
        let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

        block_on(async {
            let tr = db.create_transaction().unwrap();
            for (k, v) in &seed {
                tr.set(&key(*k), &[*v]).unwrap();
            }
            tr.commit().await.unwrap();
        });
        for (k, v) in &seed {
            model.insert(key(*k), vec![*v]);
        }

        let tr = db.create_transaction().unwrap();
        for op in &ops {
            match op {
                Op::Set(k, v) => {
                    tr.set(&key(*k), &[*v]).unwrap();
                    model.insert(key(*k), vec![*v]);
                }
                Op::Clear(k) => {
                    tr.clear(&key(*k)).unwrap();
                    model.remove(&key(*k));
                }
                Op::ClearRange(a, b) => {
                    tr.clear_range(&key(*a), &key(*b)).unwrap();
                    model.retain(|k, _| !(k.as_slice() >= key(*a).as_slice() && k.as_slice() < key(*b).as_slice()));
                }
            }
        }

        let expected: Vec<KeyValue> = model
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect();
        prop_assert_eq!(read_all(Arc::clone(&tr)), expected.clone());

        block_on(tr.commit()).unwrap();
        let fresh = db.create_transaction().unwrap();
        prop_assert_eq!(read_all(fresh), expected);
    }
}
