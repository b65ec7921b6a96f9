//! Serialization context
//!
//! A serialization context holds the per-connection encoding rules that turn
//! structured packets into bytes, currently the item type dictionary (string item
//! identifiers to numeric network ids). Contexts are shared through `Arc`; two
//! connections use the same context only if they hold the same `Arc`, even when
//! the dictionaries happen to be equal.

use protobridge_core::{BridgeError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier of the empty item slot
pub const AIR_ITEM: &str = "minecraft:air";

/// One row of the item type dictionary, as sent in the start game packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTypeEntry {
    pub string_id: String,
    pub numeric_id: i16,
    pub component_based: bool,
}

impl ItemTypeEntry {
    pub fn new(string_id: impl Into<String>, numeric_id: i16, component_based: bool) -> Self {
        Self {
            string_id: string_id.into(),
            numeric_id,
            component_based,
        }
    }
}

/// Bidirectional item id mapping
#[derive(Debug, Clone, Default)]
pub struct ItemTypeDictionary {
    entries: Vec<ItemTypeEntry>,
    by_string: HashMap<String, i16>,
    by_numeric: HashMap<i16, String>,
}

impl ItemTypeDictionary {
    /// Build a dictionary, rejecting duplicate string or numeric ids
    pub fn new(entries: Vec<ItemTypeEntry>) -> Result<Self> {
        let mut by_string = HashMap::with_capacity(entries.len());
        let mut by_numeric = HashMap::with_capacity(entries.len());
        for entry in &entries {
            if by_string.insert(entry.string_id.clone(), entry.numeric_id).is_some() {
                return Err(BridgeError::InvalidData(format!(
                    "Duplicate item string id {}",
                    entry.string_id
                )));
            }
            if by_numeric.insert(entry.numeric_id, entry.string_id.clone()).is_some() {
                return Err(BridgeError::InvalidData(format!(
                    "Duplicate item numeric id {}",
                    entry.numeric_id
                )));
            }
        }
        Ok(Self {
            entries,
            by_string,
            by_numeric,
        })
    }

    /// A handful of vanilla items, enough for a lobby server and for tests
    pub fn vanilla_subset() -> Self {
        let entries = vec![
            ItemTypeEntry::new("minecraft:stone", 1, false),
            ItemTypeEntry::new("minecraft:grass", 2, false),
            ItemTypeEntry::new("minecraft:dirt", 3, false),
            ItemTypeEntry::new("minecraft:stick", 320, false),
            ItemTypeEntry::new("minecraft:diamond_sword", 316, false),
            ItemTypeEntry::new("minecraft:compass", 391, false),
            ItemTypeEntry::new("minecraft:shield", 355, false),
        ];
        let mut by_string = HashMap::new();
        let mut by_numeric = HashMap::new();
        for entry in &entries {
            by_string.insert(entry.string_id.clone(), entry.numeric_id);
            by_numeric.insert(entry.numeric_id, entry.string_id.clone());
        }
        Self {
            entries,
            by_string,
            by_numeric,
        }
    }

    pub fn entries(&self) -> &[ItemTypeEntry] {
        &self.entries
    }

    pub fn to_numeric(&self, string_id: &str) -> Result<i16> {
        if string_id == AIR_ITEM {
            return Ok(0);
        }
        self.by_string
            .get(string_id)
            .copied()
            .ok_or_else(|| BridgeError::NotFound(format!("Item {} is not in the item dictionary", string_id)))
    }

    pub fn from_numeric(&self, numeric_id: i16) -> Result<&str> {
        if numeric_id == 0 {
            return Ok(AIR_ITEM);
        }
        self.by_numeric
            .get(&numeric_id)
            .map(String::as_str)
            .ok_or_else(|| BridgeError::InvalidData(format!("Unknown item network id {}", numeric_id)))
    }
}

/// Encoding rules for one group of connections
#[derive(Debug)]
pub struct SerializerContext {
    item_dictionary: ItemTypeDictionary,
}

impl SerializerContext {
    pub fn new(item_dictionary: ItemTypeDictionary) -> Self {
        Self { item_dictionary }
    }

    pub fn shared(item_dictionary: ItemTypeDictionary) -> Arc<Self> {
        Arc::new(Self::new(item_dictionary))
    }

    pub fn item_dictionary(&self) -> &ItemTypeDictionary {
        &self.item_dictionary
    }

    /// Identity of a shared context, valid while the `Arc` is alive
    #[inline]
    pub fn identity(context: &Arc<Self>) -> usize {
        Arc::as_ptr(context) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_lookup() {
        let dict = ItemTypeDictionary::vanilla_subset();
        assert_eq!(dict.to_numeric("minecraft:stick").unwrap(), 320);
        assert_eq!(dict.from_numeric(320).unwrap(), "minecraft:stick");
        assert_eq!(dict.to_numeric(AIR_ITEM).unwrap(), 0);
        assert!(dict.to_numeric("minecraft:unobtainium").is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = ItemTypeDictionary::new(vec![
            ItemTypeEntry::new("a", 1, false),
            ItemTypeEntry::new("b", 1, false),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_is_by_reference() {
        let a = SerializerContext::shared(ItemTypeDictionary::vanilla_subset());
        let b = SerializerContext::shared(ItemTypeDictionary::vanilla_subset());
        assert_eq!(SerializerContext::identity(&a), SerializerContext::identity(&a.clone()));
        assert_ne!(SerializerContext::identity(&a), SerializerContext::identity(&b));
    }
}
