//! Raw activity report as returned by the usage-counter endpoint.
//!
//! Every field is optional: absent or `null` means "not reported". A field
//! that is present with the wrong JSON type fails deserialization.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::counts::Counts;

/// A collection that arrives either as an ordered list or as an object keyed
/// by id (namespaces), path (mounts) or version. Keyed collections carry no
/// order.
#[derive(Debug)]
pub enum Keyed<T> {
    Ordered(Vec<T>),
    ByKey(BTreeMap<String, T>),
}

// Visits the list or the map directly so a bad element reports its own error
// instead of a generic "no variant matched".
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Keyed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyedVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for KeyedVisitor<T> {
            type Value = Keyed<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list or an object keyed by id")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Keyed::Ordered(items))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut items = BTreeMap::new();
                while let Some((key, item)) = map.next_entry::<String, T>()? {
                    items.insert(key, item);
                }
                Ok(Keyed::ByKey(items))
            }
        }

        deserializer.deserialize_any(KeyedVisitor(PhantomData))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawActivityResponse {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub total: Option<Counts>,
    pub by_namespace: Option<Keyed<RawNamespace>>,
    pub months: Option<Vec<RawMonth>>,
    /// Upgrade history from `sys/version-history`, merged in by the caller.
    /// Either a list or the `key_info` object keyed by version.
    pub version_history: Option<Keyed<RawVersionUpdate>>,
}

#[derive(Debug, Deserialize)]
pub struct RawNamespace {
    pub namespace_id: Option<String>,
    pub namespace_path: Option<String>,
    pub counts: Option<Counts>,
    pub mounts: Option<Keyed<RawMount>>,
}

#[derive(Debug, Deserialize)]
pub struct RawMount {
    pub mount_path: Option<String>,
    pub counts: Option<Counts>,
}

#[derive(Debug, Deserialize)]
pub struct RawMonth {
    pub timestamp: Option<String>,
    pub counts: Option<Counts>,
    pub namespaces: Option<Keyed<RawNamespace>>,
    pub new_clients: Option<RawNewClients>,
}

#[derive(Debug, Deserialize)]
pub struct RawNewClients {
    pub counts: Option<Counts>,
    pub namespaces: Option<Keyed<RawNamespace>>,
}

#[derive(Debug, Deserialize)]
pub struct RawVersionUpdate {
    pub version: Option<String>,
    pub previous_version: Option<String>,
    pub timestamp_installed: Option<String>,
}
