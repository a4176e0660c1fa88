use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

fn approved_by_default() -> bool {
    true
}

/// Reads a text field from hand-edited documents: null becomes empty,
/// numbers and booleans keep their text form, anything else is empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    })
}

/// Only an explicit `false` withdraws approval.
fn lenient_approved<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(!matches!(Value::deserialize(deserializer)?, Value::Bool(false)))
}

/// The stored fields of an item document.
///
/// Unknown fields survive a read-modify-write through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,
    /// ID of the region document the item belongs to.
    #[serde(default, deserialize_with = "lenient_string")]
    pub region: String,
    #[serde(default = "approved_by_default", deserialize_with = "lenient_approved")]
    pub approved: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    #[serde(flatten)]
    pub fields: ItemFields,
}

impl Item {
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn category(&self) -> &str {
        &self.fields.category
    }

    pub fn region(&self) -> &str {
        &self.fields.region
    }
}

/// Payload for creating an item. New items are always stored as approved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub region: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<NewItem> for ItemFields {
    fn from(item: NewItem) -> Self {
        let mut extra = item.extra;
        extra.remove("approved");
        extra.remove("id");
        Self {
            name: item.name,
            category: item.category,
            region: item.region,
            approved: true,
            extra,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Region {
    pub id: String,
    #[serde(flatten)]
    pub fields: RegionFields,
}

impl Region {
    pub fn name(&self) -> &str {
        &self.fields.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewRegion {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<NewRegion> for RegionFields {
    fn from(region: NewRegion) -> Self {
        let mut extra = region.extra;
        extra.remove("id");
        Self {
            name: region.name,
            extra,
        }
    }
}

/// The `admins/{uid}` document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AdminRecord {
    #[serde(rename = "isAdmin")]
    pub is_admin: Option<Value>,
}

impl AdminRecord {
    /// Only a literal boolean `true` grants admin rights.
    pub fn grants_admin(&self) -> bool {
        matches!(self.is_admin, Some(Value::Bool(true)))
    }
}
