//! Client-side report registry and the status-update merge step.
//!
//! The registry is published as immutable snapshots. Every mutation builds a
//! new [`ReportList`] and swaps it in whole, so an observer holding a snapshot
//! never sees a half-applied update and can detect change with `Arc::ptr_eq`.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use shared::{
    domain::ReportId,
    protocol::{Report, ReportStatusUpdate},
};
use tokio::sync::watch;
use tracing::{debug, info};

/// One published registry snapshot, in insertion order.
pub type ReportList = Arc<Vec<Arc<Report>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// No report with the update's id; nothing was published.
    Missing,
    /// The update carried a sequence number at or below one already applied.
    Stale,
}

/// Applies one status update to a snapshot.
///
/// The input is never modified. On a miss the same `Arc` is returned; on a hit
/// every element other than the target keeps its identity.
pub fn merge(current: &ReportList, update: &ReportStatusUpdate) -> ReportList {
    let Some(index) = position_of(current, &update.id) else {
        return Arc::clone(current);
    };

    let mut next = Vec::clone(current);
    next[index] = Arc::new(current[index].with_status(update.status));
    Arc::new(next)
}

fn position_of(reports: &[Arc<Report>], report_id: &ReportId) -> Option<usize> {
    reports.iter().position(|r| &r.report_id == report_id)
}

pub struct Registry {
    snapshots: watch::Sender<ReportList>,
    last_seq: Mutex<HashMap<ReportId, u64>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            snapshots,
            last_seq: Mutex::new(HashMap::new()),
        }
    }

    pub fn snapshot(&self) -> ReportList {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ReportList> {
        self.snapshots.subscribe()
    }

    pub fn len(&self) -> usize {
        self.snapshots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole collection with a freshly fetched report set.
    /// Repeated ids keep their first occurrence.
    pub fn replace_all(&self, reports: Vec<Report>) {
        let mut seen = HashSet::new();
        let list: Vec<Arc<Report>> = reports
            .into_iter()
            .filter(|r| seen.insert(r.report_id.clone()))
            .map(Arc::new)
            .collect();

        self.lock_seq().clear();
        debug!(reports = list.len(), "registry populated");
        self.snapshots.send_replace(Arc::new(list));
    }

    /// Adds a newly created report at the end. A report whose id is already
    /// present replaces the existing entry where it stands.
    pub fn append(&self, report: Report) {
        self.snapshots.send_modify(|current| {
            let mut next = Vec::clone(current);
            match position_of(&next, &report.report_id) {
                Some(index) => next[index] = Arc::new(report),
                None => next.push(Arc::new(report)),
            }
            *current = Arc::new(next);
        });
    }

    pub fn apply_update(&self, update: &ReportStatusUpdate) -> MergeOutcome {
        let mut outcome = MergeOutcome::Missing;
        self.snapshots.send_if_modified(|current| {
            if position_of(current, &update.id).is_none() {
                return false;
            }
            if let Some(seq) = update.seq {
                let mut last_seq = self.lock_seq();
                match last_seq.get(&update.id) {
                    Some(&applied) if seq <= applied => {
                        outcome = MergeOutcome::Stale;
                        return false;
                    }
                    _ => {
                        last_seq.insert(update.id.clone(), seq);
                    }
                }
            }
            *current = merge(current, update);
            outcome = MergeOutcome::Applied;
            true
        });

        match outcome {
            MergeOutcome::Applied => {
                debug!(report_id = %update.id, status = %update.status, "report status updated")
            }
            MergeOutcome::Missing => info!(
                report_id = %update.id,
                status = %update.status,
                "dropping status update for unknown report"
            ),
            MergeOutcome::Stale => info!(
                report_id = %update.id,
                seq = ?update.seq,
                "dropping out-of-order status update"
            ),
        }
        outcome
    }

    fn lock_seq(&self) -> std::sync::MutexGuard<'_, HashMap<ReportId, u64>> {
        self.last_seq
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
