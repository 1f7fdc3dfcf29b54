//! Batch Executor Module
//!
//! Applies a sequence of get/update/delete operations against the entry
//! store, in order and without batch atomicity.

use std::collections::BTreeMap;

use tracing::debug;

use crate::cache::EntryStore;
use crate::models::{BatchOp, OpKind, OpOutcome};

/// Runs `ops` in sequence and maps each key to its last operation's outcome.
///
/// Operations without a kind or key, and updates without data, are skipped
/// and leave no entry in the result. Earlier operations are never rolled back.
pub fn execute_batch(store: &EntryStore, ops: &[BatchOp]) -> BTreeMap<String, OpOutcome> {
    let mut results = BTreeMap::new();

    for (index, op) in ops.iter().enumerate() {
        let (Some(kind), Some(key)) = (op.kind, op.key.as_deref()) else {
            debug!(index, "skipping batch operation without type or key");
            continue;
        };

        let outcome = match kind {
            OpKind::Delete => OpOutcome::Applied(store.delete(key)),
            OpKind::Update => match &op.data {
                Some(data) => OpOutcome::Applied(store.update(key, data)),
                None => {
                    debug!(index, key, "skipping update without data");
                    continue;
                }
            },
            OpKind::Get => store.get(key).map_or(OpOutcome::Missing, OpOutcome::Value),
        };

        results.insert(key.to_string(), outcome);
    }

    results
}
