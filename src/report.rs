//! Assembly of the dashboard report from a normalized activity report.

use serde_json::Value;

use crate::aggregate::build_months;
use crate::config::EngineOptions;
use crate::error::ActivityError;
use crate::models::counts::CountField;
use crate::models::month::MonthKey;
use crate::models::report::{ActivityReport, RankedEntry, RangeReport, UpstreamWindow};
use crate::normalize::{normalize, NormalizedReport};
use crate::range::{new_client_totals, reduce_range};
use crate::ranking::{top_n, QualifiedMount};
use crate::versions::filter_version_history;

/// Inclusive month bounds. Either may be omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeQuery {
    pub start: Option<MonthKey>,
    pub end: Option<MonthKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopNConfig {
    pub field: CountField,
    pub n: usize,
    /// Rank only this namespace's mounts. Matches label or id.
    pub namespace: Option<String>,
}

impl Default for TopNConfig {
    fn default() -> Self {
        Self {
            field: CountField::Clients,
            n: 10,
            namespace: None,
        }
    }
}

/// Builds months, reduces them over `range` and ranks the result. The
/// upstream window and its upgrades are carried through unchanged by the
/// range.
pub fn assemble(
    normalized: &NormalizedReport,
    range: &RangeQuery,
    top: &TopNConfig,
) -> Result<ActivityReport, ActivityError> {
    let months = build_months(&normalized.months)?;
    let range_report = reduce_range(&months, range.start, range.end)?;
    let top_namespaces = top_n(&range_report.by_namespace, top.field, top.n)?;
    let top_mounts = rank_mounts(&range_report, top)?;
    let new_client_totals = new_client_totals(&range_report.by_month);
    let upgrades = filter_version_history(
        &normalized.version_history,
        normalized.start_time,
        normalized.end_time,
    );

    Ok(ActivityReport {
        range: range_report,
        new_client_totals,
        ranked_by: top.field,
        top_namespaces,
        top_mounts,
        upstream: UpstreamWindow {
            start_time: normalized.start_time,
            end_time: normalized.end_time,
            total: normalized.total,
            by_namespace: normalized.by_namespace.clone(),
        },
        upgrades,
    })
}

fn rank_mounts(report: &RangeReport, top: &TopNConfig) -> Result<Vec<RankedEntry>, ActivityError> {
    match top.namespace.as_deref() {
        Some(selected) => match report
            .by_namespace
            .iter()
            .find(|ns| ns.label == selected || ns.id == selected)
        {
            Some(ns) => top_n(&ns.mounts, top.field, top.n),
            None => Ok(Vec::new()),
        },
        None => top_n(&QualifiedMount::all(&report.by_namespace), top.field, top.n),
    }
}

/// Normalizes `raw` and assembles the report in one step.
pub fn generate(
    raw: &Value,
    opts: &EngineOptions,
    range: &RangeQuery,
    top: &TopNConfig,
) -> Result<ActivityReport, ActivityError> {
    let normalized = normalize(raw, opts)?;
    assemble(&normalized, range, top)
}
