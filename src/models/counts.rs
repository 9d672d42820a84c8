use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Client usage counters for one scope (month, namespace, mount or range).
///
/// On older servers `clients == entity_clients + non_entity_clients`. Newer
/// ones also fold secret syncs and ACME clients into `clients`, so the
/// equality is only enforced when strict counts are requested.
///
/// Deserialization is lenient per field: a counter that is missing, `null`,
/// negative, fractional or not a number reads as zero. Legacy fields such as
/// `non_entity_tokens` and `distinct_entities` are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Counts {
    #[serde(default, deserialize_with = "lenient_counter")]
    pub clients: u64,
    #[serde(default, deserialize_with = "lenient_counter")]
    pub entity_clients: u64,
    #[serde(default, deserialize_with = "lenient_counter")]
    pub non_entity_clients: u64,
    #[serde(default, deserialize_with = "lenient_counter")]
    pub secret_syncs: u64,
    #[serde(default, deserialize_with = "lenient_counter")]
    pub acme_clients: u64,
}

fn lenient_counter<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().unwrap_or(0))
}

impl Counts {
    pub fn get(&self, field: CountField) -> u64 {
        match field {
            CountField::Clients => self.clients,
            CountField::EntityClients => self.entity_clients,
            CountField::NonEntityClients => self.non_entity_clients,
            CountField::SecretSyncs => self.secret_syncs,
            CountField::AcmeClients => self.acme_clients,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Counts::default()
    }

    /// `clients == entity_clients + non_entity_clients`.
    pub fn is_balanced(&self) -> bool {
        self.entity_clients
            .checked_add(self.non_entity_clients)
            .is_some_and(|sum| sum == self.clients)
    }

    /// True when every field is less than or equal to the same field of `other`.
    pub fn fits_within(&self, other: &Counts) -> bool {
        CountField::ALL
            .iter()
            .all(|&field| self.get(field) <= other.get(field))
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, rhs: Counts) -> Counts {
        Counts {
            clients: self.clients.saturating_add(rhs.clients),
            entity_clients: self.entity_clients.saturating_add(rhs.entity_clients),
            non_entity_clients: self.non_entity_clients.saturating_add(rhs.non_entity_clients),
            secret_syncs: self.secret_syncs.saturating_add(rhs.secret_syncs),
            acme_clients: self.acme_clients.saturating_add(rhs.acme_clients),
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        *self = *self + rhs;
    }
}

impl Sum for Counts {
    fn sum<I: Iterator<Item = Counts>>(iter: I) -> Counts {
        iter.fold(Counts::default(), Add::add)
    }
}

impl<'a> Sum<&'a Counts> for Counts {
    fn sum<I: Iterator<Item = &'a Counts>>(iter: I) -> Counts {
        iter.copied().sum()
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clients={} entity={} non_entity={} secret_syncs={} acme={}",
            self.clients,
            self.entity_clients,
            self.non_entity_clients,
            self.secret_syncs,
            self.acme_clients
        )
    }
}

/// Selects one of the [`Counts`] fields, by its wire name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountField {
    #[default]
    Clients,
    EntityClients,
    NonEntityClients,
    SecretSyncs,
    AcmeClients,
}

impl CountField {
    pub const ALL: [CountField; 5] = [
        CountField::Clients,
        CountField::EntityClients,
        CountField::NonEntityClients,
        CountField::SecretSyncs,
        CountField::AcmeClients,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CountField::Clients => "clients",
            CountField::EntityClients => "entity_clients",
            CountField::NonEntityClients => "non_entity_clients",
            CountField::SecretSyncs => "secret_syncs",
            CountField::AcmeClients => "acme_clients",
        }
    }
}

impl fmt::Display for CountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CountField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown count field '{s}'"))
    }
}
