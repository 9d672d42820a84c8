//! Reduction of monthly records over an inclusive month range.

use std::collections::HashMap;

use crate::error::ActivityError;
use crate::models::counts::{CountField, Counts};
use crate::models::month::MonthKey;
use crate::models::records::{MonthRecord, MountRecord, NamespaceRecord};
use crate::models::report::RangeReport;
use crate::ranking::sort_ranked;

/// Collapses `months` into totals over `[start, end]`.
///
/// `months` must be chronological with no repeats. An omitted bound defaults
/// to the first or last supplied month, or to the other bound when that lies
/// outside the supplied months.
pub fn reduce_range(
    months: &[MonthRecord],
    start: Option<MonthKey>,
    end: Option<MonthKey>,
) -> Result<RangeReport, ActivityError> {
    ensure_chronological(months)?;

    let first = months.first().map(|m| m.month);
    let last = months.last().map(|m| m.month);
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) if start > end => {
            return Err(ActivityError::EmptyRange { start, end });
        }
        (Some(start), Some(end)) => (Some(start), Some(end)),
        (Some(start), None) => (Some(start), Some(last.map_or(start, |l| l.max(start)))),
        (None, Some(end)) => (Some(first.map_or(end, |f| f.min(end))), Some(end)),
        (None, None) => (first, last),
    };

    let by_month: Vec<MonthRecord> = months
        .iter()
        .filter(|m| start.map_or(true, |s| m.month >= s) && end.map_or(true, |e| m.month <= e))
        .cloned()
        .collect();

    let totals: Counts = by_month.iter().map(|m| &m.counts).sum();
    let by_namespace = merge_namespaces(by_month.iter().flat_map(|m| m.namespaces.iter()));

    tracing::debug!(
        start = ?start.map(|s| s.to_string()),
        end = ?end.map(|e| e.to_string()),
        months = by_month.len(),
        namespaces = by_namespace.len(),
        total_clients = totals.clients,
        "Reduced month range"
    );

    Ok(RangeReport {
        start,
        end,
        totals,
        by_month,
        by_namespace,
    })
}

/// Sum of the new-client counts across `months`.
pub fn new_client_totals(months: &[MonthRecord]) -> Counts {
    months.iter().map(|m| &m.new_clients.counts).sum()
}

fn ensure_chronological(months: &[MonthRecord]) -> Result<(), ActivityError> {
    match months.windows(2).find(|w| w[0].month >= w[1].month) {
        Some(pair) => Err(ActivityError::MalformedReport(format!(
            "months out of order: {} precedes {}",
            pair[0].month, pair[1].month
        ))),
        None => Ok(()),
    }
}

/// Sums namespaces across months by [`NamespaceRecord::merge_key`] and
/// mounts by label. The latest label seen wins. Output is in rank order.
fn merge_namespaces<'a>(
    namespaces: impl Iterator<Item = &'a NamespaceRecord>,
) -> Vec<NamespaceRecord> {
    let mut merged: Vec<NamespaceRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for ns in namespaces {
        let slot = *index.entry(ns.merge_key().to_string()).or_insert_with(|| {
            merged.push(NamespaceRecord {
                id: ns.id.clone(),
                label: ns.label.clone(),
                counts: Counts::default(),
                mounts: Vec::new(),
            });
            merged.len() - 1
        });
        let target = &mut merged[slot];
        target.label.clone_from(&ns.label);
        target.counts += ns.counts;
        merge_mounts(&mut target.mounts, &ns.mounts);
    }

    for ns in &mut merged {
        sort_ranked(&mut ns.mounts, CountField::Clients);
    }
    sort_ranked(&mut merged, CountField::Clients);
    merged
}

fn merge_mounts(target: &mut Vec<MountRecord>, mounts: &[MountRecord]) {
    for mount in mounts {
        match target.iter_mut().find(|m| m.label == mount.label) {
            Some(existing) => existing.counts += mount.counts,
            None => target.push(mount.clone()),
        }
    }
}
