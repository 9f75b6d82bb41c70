//! Per-section ordering of items.

use std::cmp::Ordering;

use serde::Deserialize;

use crate::item::{Item, Section, SectionSpec};

/// Field used to order items within a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Date,
    Title,
    Id,
}

/// Direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// How a section orders its items. Defaults to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct SortSpec {
    #[serde(default)]
    pub key: SortKey,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    fn compare(&self, a: &Item, b: &Item) -> Ordering {
        let ordering = match self.key {
            SortKey::Date => a.date.cmp(&b.date),
            SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortKey::Id => a.id.cmp(&b.id),
        };

        match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// Sort items in place. Equal items keep their load order.
pub fn sort_items(items: &mut [Item], spec: &SortSpec) {
    // slice::sort_by is stable
    items.sort_by(|a, b| spec.compare(a, b));
}

/// Sort every section by its declared spec, returning the reordered sections.
///
/// Sections without a matching spec use the default order.
pub fn organize(sections: Vec<Section>, specs: &[SectionSpec]) -> Vec<Section> {
    sections
        .into_iter()
        .map(|mut section| {
            let spec = specs
                .iter()
                .find(|s| s.id == section.id)
                .map(|s| s.sort)
                .unwrap_or_default();

            sort_items(&mut section.items, &spec);
            tracing::debug!(
                "Sorted {} items in section '{}' by {:?} {:?}",
                section.items.len(),
                section.id,
                spec.key,
                spec.order
            );
            section
        })
        .collect()
}
