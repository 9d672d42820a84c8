use serde::Serialize;

use super::counts::Counts;
use super::month::MonthKey;
use crate::error::ActivityError;

/// Label given to the root namespace, which is reported with an empty path.
pub const ROOT_NAMESPACE: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountRecord {
    pub label: String,
    pub counts: Counts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRecord {
    pub id: String,
    pub label: String,
    pub counts: Counts,
    pub mounts: Vec<MountRecord>,
}

impl NamespaceRecord {
    /// Identity used when merging the same namespace across months.
    pub fn merge_key(&self) -> &str {
        if self.id.is_empty() {
            &self.label
        } else {
            &self.id
        }
    }

    pub fn mount(&self, label: &str) -> Option<&MountRecord> {
        self.mounts.iter().find(|m| m.label == label)
    }

    /// Checks that the mounts add up to the namespace's own counts.
    /// A namespace reported without mount detail passes trivially.
    pub fn verify_mounts(&self) -> Result<(), ActivityError> {
        if self.mounts.is_empty() {
            return Ok(());
        }
        let summed: Counts = self.mounts.iter().map(|m| &m.counts).sum();
        if summed != self.counts {
            return Err(ActivityError::IntegrityViolation(format!(
                "namespace '{}' reports {} but its {} mounts sum to {}",
                self.label,
                self.counts,
                self.mounts.len(),
                summed
            )));
        }
        Ok(())
    }
}

/// Clients first seen in a given month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClients {
    pub counts: Counts,
    pub namespaces: Vec<NamespaceRecord>,
}

impl NewClients {
    pub fn namespace(&self, label: &str) -> Option<&NamespaceRecord> {
        self.namespaces.iter().find(|ns| ns.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    pub month: MonthKey,
    pub counts: Counts,
    pub namespaces: Vec<NamespaceRecord>,
    pub new_clients: NewClients,
}

impl MonthRecord {
    pub fn namespace(&self, label: &str) -> Option<&NamespaceRecord> {
        self.namespaces.iter().find(|ns| ns.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(clients: u64, entity: u64, non_entity: u64) -> Counts {
        Counts {
            clients,
            entity_clients: entity,
            non_entity_clients: non_entity,
            ..Counts::default()
        }
    }

    fn mount(label: &str, c: Counts) -> MountRecord {
        MountRecord {
            label: label.into(),
            counts: c,
        }
    }

    #[test]
    fn test_merge_key_falls_back_to_label() {
        let mut ns = NamespaceRecord {
            id: "s07UR".into(),
            label: "ns1/".into(),
            counts: Counts::default(),
            mounts: vec![],
        };
        assert_eq!(ns.merge_key(), "s07UR");
        ns.id.clear();
        assert_eq!(ns.merge_key(), "ns1/");
    }

    #[test]
    fn test_verify_mounts() {
        let ns = NamespaceRecord {
            id: "root".into(),
            label: ROOT_NAMESPACE.into(),
            counts: counts(15, 8, 7),
            mounts: vec![
                mount("auth/up2/", counts(8, 8, 0)),
                mount("auth/up1/", counts(7, 0, 7)),
            ],
        };
        assert!(ns.verify_mounts().is_ok());
        assert_eq!(ns.mount("auth/up1/").unwrap().counts.clients, 7);

        let broken = NamespaceRecord {
            counts: counts(16, 9, 7),
            ..ns.clone()
        };
        assert!(matches!(
            broken.verify_mounts(),
            Err(ActivityError::IntegrityViolation(_))
        ));

        let no_detail = NamespaceRecord {
            mounts: vec![],
            ..broken
        };
        assert!(no_detail.verify_mounts().is_ok());
    }
}
