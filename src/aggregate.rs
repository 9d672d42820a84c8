//! Canonical per-month records.

use crate::error::ActivityError;
use crate::models::records::{MonthRecord, NewClients};
use crate::normalize::NormalizedMonth;

/// Builds the canonical record for one month.
///
/// Totals come from the block itself rather than from summing namespaces,
/// since namespace detail may be redacted for the caller while the grand
/// total is still accurate. Missing totals, namespaces and new-client data
/// all default to empty.
pub fn build_month(block: &NormalizedMonth) -> Result<MonthRecord, ActivityError> {
    let counts = block.counts.unwrap_or_default();
    let namespaces = block.namespaces.clone().unwrap_or_default();
    let new_clients = block
        .new_clients
        .as_ref()
        .map(|raw| NewClients {
            counts: raw.counts.unwrap_or_default(),
            namespaces: raw.namespaces.clone().unwrap_or_default(),
        })
        .unwrap_or_default();

    if !new_clients.counts.fits_within(&counts) {
        return Err(ActivityError::IntegrityViolation(format!(
            "month {}: new clients ({}) exceed total clients ({})",
            block.month, new_clients.counts, counts
        )));
    }

    Ok(MonthRecord {
        month: block.month,
        counts,
        namespaces,
        new_clients,
    })
}

/// Builds every month in order, stopping at the first failure.
pub fn build_months(blocks: &[NormalizedMonth]) -> Result<Vec<MonthRecord>, ActivityError> {
    let months = blocks
        .iter()
        .map(build_month)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(months = months.len(), "Built monthly records");
    Ok(months)
}
