use super::models::{Item, Region};
use serde::{Deserialize, Serialize};

/// Search criteria for the item search tab. Absent or blank fields match everything.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ItemQuery {
    pub text: Option<String>,
    pub category: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub item: Item,
    /// `None` when the referenced region no longer exists.
    pub region_name: Option<String>,
}

fn criterion(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ItemQuery {
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(text) = criterion(&self.text) {
            let needle = text.to_lowercase();
            if !item.name().to_lowercase().contains(&needle)
                && !item.category().to_lowercase().contains(&needle)
            {
                return false;
            }
        }

        if let Some(category) = criterion(&self.category) {
            if item.category().to_lowercase() != category.to_lowercase() {
                return false;
            }
        }

        if let Some(region) = criterion(&self.region) {
            if item.region() != region {
                return false;
            }
        }

        true
    }
}

/// Filters `items` in order and resolves each hit's region name.
pub fn search(items: &[Item], regions: &[Region], query: &ItemQuery) -> Vec<SearchHit> {
    items
        .iter()
        .filter(|item| query.matches(item))
        .map(|item| SearchHit {
            item: item.clone(),
            region_name: regions
                .iter()
                .find(|region| region.id == item.region())
                .map(|region| region.name().to_string()),
        })
        .collect()
}
