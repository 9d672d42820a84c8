use chrono::{DateTime, Utc};
use serde::Serialize;

use super::counts::{CountField, Counts};
use super::month::MonthKey;
use super::records::{MonthRecord, NamespaceRecord};
use crate::versions::VersionUpdate;

/// Totals over an inclusive span of months.
///
/// `start` and `end` are `None` only when no bound was requested and there
/// were no months to infer one from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeReport {
    pub start: Option<MonthKey>,
    pub end: Option<MonthKey>,
    pub totals: Counts,
    pub by_month: Vec<MonthRecord>,
    pub by_namespace: Vec<NamespaceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub label: String,
    pub value: u64,
    /// Synthetic bucket holding everything past the rank cutoff.
    pub is_other: bool,
}

/// The query window the upstream report covers, with the totals it
/// reported for that whole window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamWindow {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total: Counts,
    pub by_namespace: Vec<NamespaceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    #[serde(flatten)]
    pub range: RangeReport,
    pub new_client_totals: Counts,
    pub ranked_by: CountField,
    pub top_namespaces: Vec<RankedEntry>,
    pub top_mounts: Vec<RankedEntry>,
    pub upstream: UpstreamWindow,
    /// Upgrades inside the upstream window that changed how clients count.
    pub upgrades: Vec<VersionUpdate>,
}
