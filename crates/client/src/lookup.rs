//! Multi-key lookup with a bounded deferred-key retry loop
//!
//! A lookup response partitions the requested keys into found, missing and
//! deferred. Deferred keys are a normal backend signal: the loop re-queries
//! them until none remain or the retry ceiling is reached. Hitting the
//! ceiling silently truncates the result rather than failing; the keys
//! still outstanding are surfaced through the caller's `deferred` slot.
//!
//! Keys that resolve on a retry are never reported as deferred: only the
//! working set left over when the ceiling stops the loop reaches the
//! caller.

use crate::connection::{Connection, EntityData, TransactionId};
use lodestore_core::{Key, Result};
use tracing::{debug, warn};

/// Run the lookup loop, accumulating found entities in wire form.
///
/// `missing` and `deferred` are caller-supplied output slots, verified empty
/// by the caller before any RPC. A `max_loops` of zero means the loop never
/// executes: the result is empty and neither slot is touched.
pub(crate) fn extended_lookup(
    connection: &dyn Connection,
    project: &str,
    keys: Vec<Key>,
    mut missing: Option<&mut Vec<Key>>,
    deferred: Option<&mut Vec<Key>>,
    eventual: bool,
    transaction: Option<&TransactionId>,
    max_loops: usize,
) -> Result<Vec<EntityData>> {
    let mut results = Vec::new();
    let mut work = keys;
    let mut loops = 0;

    while loops < max_loops && !work.is_empty() {
        loops += 1;
        let response = connection.lookup(project, &work, eventual, transaction)?;
        debug!(
            pass = loops,
            found = response.found.len(),
            missing = response.missing.len(),
            deferred = response.deferred.len(),
            "lookup pass"
        );

        results.extend(response.found);
        if let Some(missing) = missing.as_deref_mut() {
            missing.extend(response.missing);
        }
        // Deferred keys become the working set for the next pass.
        work = response.deferred;
    }

    // `loops > 0` distinguishes a ceiling hit from a loop that never ran:
    // an untouched input working set is not a backend deferral.
    if !work.is_empty() && loops > 0 {
        warn!(
            remaining = work.len(),
            ceiling = max_loops,
            "lookup retry ceiling reached; returning truncated results"
        );
        if let Some(deferred) = deferred {
            deferred.extend(work);
        }
    }

    Ok(results)
}
