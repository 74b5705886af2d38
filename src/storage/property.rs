use std::collections::BTreeMap;

use crate::types::PropId;

/// Property value stored on a vertex or edge.
///
/// `Null` doubles as the "absent" marker in undo records: a `SetProperty`
/// delta whose prior value is `Null` removes the key when replayed.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PropertyValue {
    /// Null value, also denoting an absent key.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Owned string.
    Str(String),
    /// Owned byte vector.
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Returns `true` for the null/absent marker.
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }
}

/// Current property map of one versioned object.
///
/// The physical encoding is opaque to the rest of the core; only this
/// map-like contract (get/set/clear/enumerate by key) is relied on.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyStore {
    entries: BTreeMap<PropId, PropertyValue>,
}

impl PropertyStore {
    /// Returns the value stored under `key`, `Null` if absent.
    pub fn get(&self, key: PropId) -> PropertyValue {
        self.entries.get(&key).cloned().unwrap_or_default()
    }

    /// Stores `value` under `key` and returns the prior value (`Null` if the
    /// key was absent). Storing `Null` removes the key.
    pub fn set(&mut self, key: PropId, value: PropertyValue) -> PropertyValue {
        if value.is_null() {
            self.entries.remove(&key).unwrap_or_default()
        } else {
            self.entries.insert(key, value).unwrap_or_default()
        }
    }

    /// Removes every entry, returning the removed map.
    pub fn clear(&mut self) -> BTreeMap<PropId, PropertyValue> {
        std::mem::take(&mut self.entries)
    }

    /// Snapshots the full map.
    pub fn properties(&self) -> BTreeMap<PropId, PropertyValue> {
        self.entries.clone()
    }

    /// Returns `true` when no property is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Folds a `SetProperty` undo into a reconstructed map: re-inserts the prior
/// value, or removes the key when the prior value denotes "absent".
pub(crate) fn fold_property_undo(
    map: &mut BTreeMap<PropId, PropertyValue>,
    key: PropId,
    prior: &PropertyValue,
) {
    if prior.is_null() {
        map.remove(&key);
    } else {
        map.insert(key, prior.clone());
    }
}
