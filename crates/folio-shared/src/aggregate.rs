//! Read-side reshaping of the change log for the admin dashboard.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{ChangeKind, ChangeRecord};

/// Change counts for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub creates: u32,
    pub updates: u32,
    pub deletes: u32,
    /// Records whose action this build does not recognise.
    pub unknown: u32,
    /// Every record of the day, unknown ones included.
    pub total: u32,
}

impl DailyActivity {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            creates: 0,
            updates: 0,
            deletes: 0,
            unknown: 0,
            total: 0,
        }
    }
}

/// Group change records by day, newest day first.
pub fn aggregate_by_date(changes: &[ChangeRecord]) -> Vec<DailyActivity> {
    let mut days: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();

    for record in changes {
        let day = days
            .entry(record.date)
            .or_insert_with(|| DailyActivity::new(record.date));

        match record.action.kind() {
            ChangeKind::Create => day.creates += 1,
            ChangeKind::Update => day.updates += 1,
            ChangeKind::Delete => day.deletes += 1,
            ChangeKind::Unknown => {
                warn!(
                    action = %record.action,
                    entity = %record.entity_id,
                    date = %record.date,
                    "Unrecognised change action, counted as unknown"
                );
                day.unknown += 1;
            }
        }
        day.total += 1;
    }

    days.into_values().rev().collect()
}

/// The last `limit` records, newest first.
pub fn recent_changes(changes: &[ChangeRecord], limit: usize) -> Vec<ChangeRecord> {
    changes.iter().rev().take(limit).cloned().collect()
}
