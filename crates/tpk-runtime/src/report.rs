use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tpk_reconcile::{Reconcilable, ReconcilePlan, SkipReason};
use tpk_schemas::EntityKind;
use uuid::Uuid;

use crate::RunMode;

/// An observed entity left alone, by label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub target: String,
    pub reason: SkipReason,
}

/// Outcome of one kind. Entities are listed by label only, so user
/// password hashes never reach a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindReport {
    pub kind: EntityKind,
    pub desired: usize,
    pub observed: usize,
    pub unchanged: usize,
    pub creates: Vec<String>,
    pub deletes: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
    /// Planned operations were issued (false in plan mode or when none).
    pub applied: bool,
}

impl KindReport {
    pub fn from_plan<T: Reconcilable>(
        plan: &ReconcilePlan<T>,
        desired: usize,
        observed: usize,
    ) -> Self {
        let label = |t: &T| t.to_entity().label();
        Self {
            kind: plan.kind,
            desired,
            observed,
            unchanged: plan.unchanged,
            creates: plan.creates.iter().map(label).collect(),
            deletes: plan.deletes.iter().map(label).collect(),
            skipped: plan
                .skipped
                .iter()
                .map(|s| SkippedEntry {
                    target: label(&s.entity),
                    reason: s.reason,
                })
                .collect(),
            applied: false,
        }
    }

    pub fn operation_count(&self) -> usize {
        self.creates.len() + self.deletes.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    /// Hash of the merged topology document, when the run started from files.
    pub config_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per kind, in reconcile order.
    pub kinds: Vec<KindReport>,
}

impl RunReport {
    pub fn kind(&self, kind: EntityKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    pub fn total_creates(&self) -> usize {
        self.kinds.iter().map(|k| k.creates.len()).sum()
    }

    pub fn total_deletes(&self) -> usize {
        self.kinds.iter().map(|k| k.deletes.len()).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.kinds.iter().map(|k| k.skipped.len()).sum()
    }

    /// Broker already matched the desired state: nothing to create or delete.
    pub fn is_converged(&self) -> bool {
        self.kinds.iter().all(|k| k.operation_count() == 0)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
