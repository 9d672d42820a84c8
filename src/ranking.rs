//! Bounded top-N views over namespaces and mounts.

use std::cmp::Ordering;

use crate::error::ActivityError;
use crate::models::counts::{CountField, Counts};
use crate::models::records::{MountRecord, NamespaceRecord};
use crate::models::report::RankedEntry;

/// Label of the bucket that absorbs entries past the cutoff.
pub const OTHER_LABEL: &str = "other";

/// Anything that can be ranked by one of its count fields.
pub trait Ranked {
    fn label(&self) -> &str;
    fn counts(&self) -> &Counts;
}

impl Ranked for NamespaceRecord {
    fn label(&self) -> &str {
        &self.label
    }

    fn counts(&self) -> &Counts {
        &self.counts
    }
}

impl Ranked for MountRecord {
    fn label(&self) -> &str {
        &self.label
    }

    fn counts(&self) -> &Counts {
        &self.counts
    }
}

/// A mount labelled with its owning namespace, for rankings that span
/// every namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedMount {
    pub label: String,
    pub counts: Counts,
}

impl QualifiedMount {
    pub fn new(namespace: &NamespaceRecord, mount: &MountRecord) -> Self {
        Self {
            label: format!(
                "{}/{}",
                namespace.label.trim_end_matches('/'),
                mount.label.trim_start_matches('/')
            ),
            counts: mount.counts,
        }
    }

    pub fn all(namespaces: &[NamespaceRecord]) -> Vec<Self> {
        namespaces
            .iter()
            .flat_map(|ns| ns.mounts.iter().map(move |m| Self::new(ns, m)))
            .collect()
    }
}

impl Ranked for QualifiedMount {
    fn label(&self) -> &str {
        &self.label
    }

    fn counts(&self) -> &Counts {
        &self.counts
    }
}

/// Descending by `field`, then ascending by label.
fn rank_order<T: Ranked>(a: &T, b: &T, field: CountField) -> Ordering {
    b.counts()
        .get(field)
        .cmp(&a.counts().get(field))
        .then_with(|| a.label().cmp(b.label()))
}

/// Sorts in place into rank order. Stable, so full ties keep input order.
pub(crate) fn sort_ranked<T: Ranked>(entries: &mut [T], field: CountField) {
    entries.sort_by(|a, b| rank_order(a, b, field));
}

/// Returns at most `n` entries ranked by `field`.
///
/// When there are more than `n` entries, the top `n - 1` are returned by name
/// and everything else is folded into a single [`OTHER_LABEL`] entry, so the
/// values always add up to the field's total.
pub fn top_n<T: Ranked>(
    entries: &[T],
    field: CountField,
    n: usize,
) -> Result<Vec<RankedEntry>, ActivityError> {
    if n == 0 {
        return Err(ActivityError::InvalidTopN(n));
    }

    let mut ordered: Vec<&T> = entries.iter().collect();
    ordered.sort_by(|a, b| rank_order(*a, *b, field));

    let named = |entry: &&T| RankedEntry {
        label: entry.label().to_string(),
        value: entry.counts().get(field),
        is_other: false,
    };

    if ordered.len() <= n {
        return Ok(ordered.iter().map(named).collect());
    }

    let (head, tail) = ordered.split_at(n - 1);
    let mut ranked: Vec<RankedEntry> = head.iter().map(named).collect();
    ranked.push(RankedEntry {
        label: OTHER_LABEL.to_string(),
        value: tail
            .iter()
            .map(|entry| entry.counts().get(field))
            .fold(0u64, u64::saturating_add),
        is_other: true,
    });
    Ok(ranked)
}
