//! Serde helpers for nested [`Record`] fields.
//!
//! Use with `#[serde(with = "tagged")]` (or `tagged::option`, `tagged::vec`,
//! `tagged::map`). The nested record is written with its `_type` and, on
//! read, must carry the expected tag and pass its own `validate`.

use super::{from_tagged_value, to_tagged_value, Record};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Serialize one nested record.
pub fn serialize<T, S>(record: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Record,
    S: Serializer,
{
    to_tagged_value(record)
        .map_err(<S::Error as serde::ser::Error>::custom)?
        .serialize(serializer)
}

/// Deserialize one nested record.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Record,
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    from_tagged_value(value).map_err(serde::de::Error::custom)
}

/// Optional nested record.
pub mod option {
    use super::*;

    /// Serialize `Some` as a tagged record and `None` as null.
    pub fn serialize<T, S>(record: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Record,
        S: Serializer,
    {
        match record {
            Some(record) => super::serialize(record, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Null reads as `None`.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Record,
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => from_tagged_value(value).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// Ordered sequence of nested records.
pub mod vec {
    use super::*;

    /// Serialize every element as a tagged record.
    pub fn serialize<T, S>(records: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Record,
        S: Serializer,
    {
        let values = records
            .iter()
            .map(to_tagged_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(<S::Error as serde::ser::Error>::custom)?;
        values.serialize(serializer)
    }

    /// Every element must carry the expected tag.
    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        T: Record,
        D: Deserializer<'de>,
    {
        Vec::<Value>::deserialize(deserializer)?
            .into_iter()
            .map(from_tagged_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(serde::de::Error::custom)
    }
}

/// Keyed nested records.
pub mod map {
    use super::*;
    use serde::de::DeserializeOwned;
    use std::collections::BTreeMap;

    /// Serialize every value as a tagged record, keys unchanged.
    pub fn serialize<K, T, S>(records: &BTreeMap<K, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Ord + Serialize,
        T: Record,
        S: Serializer,
    {
        let mut values = BTreeMap::new();
        for (key, record) in records {
            let value =
                to_tagged_value(record).map_err(<S::Error as serde::ser::Error>::custom)?;
            values.insert(key, value);
        }
        values.serialize(serializer)
    }

    /// Every value must carry the expected tag.
    pub fn deserialize<'de, K, T, D>(deserializer: D) -> Result<BTreeMap<K, T>, D::Error>
    where
        K: Ord + DeserializeOwned,
        T: Record,
        D: Deserializer<'de>,
    {
        let values = BTreeMap::<K, Value>::deserialize(deserializer)?;
        let mut records = BTreeMap::new();
        for (key, value) in values {
            let record =
                from_tagged_value(value).map_err(<D::Error as serde::de::Error>::custom)?;
            records.insert(key, record);
        }
        Ok(records)
    }
}
