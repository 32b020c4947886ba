//! Item catalog: maps detector class keys to storefront search terms.

use std::collections::BTreeMap;

/// Catalog row for one item class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Search query submitted to the storefront for this class.
    pub search_term: String,
    /// Items sold in fixed multiples (egg cartons). Ordered one pack at a
    /// time regardless of the computed deficit.
    pub fixed_pack: bool,
}

/// Lookup table from detector class keys to purchasable search terms.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog matching the stock detector's class set. Search terms are
    /// Turkish because the supported storefronts are Turkish groceries.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for (key, term, fixed_pack) in [
            ("milk", "Süt", false),
            ("eggs", "Yumurta", true),
            ("cheese", "Peynir", false),
            ("yogurt", "Yoğurt", false),
            ("butter", "Tereyağı", false),
            ("water_bottle", "Su", false),
            ("juice", "Meyve Suyu", false),
            ("soda", "Gazlı İçecek", false),
            ("tomato", "Domates", false),
            ("cucumber", "Salatalık", false),
            ("pepper", "Biber", false),
            ("lettuce", "Marul", false),
            ("carrot", "Havuç", false),
            ("apple", "Elma", false),
            ("orange", "Portakal", false),
            ("lemon", "Limon", false),
            ("banana", "Muz", false),
        ] {
            catalog.insert(key, term, fixed_pack);
        }
        catalog
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        search_term: impl Into<String>,
        fixed_pack: bool,
    ) {
        self.entries.insert(
            key.into(),
            CatalogEntry {
                search_term: search_term.into(),
                fixed_pack,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    /// Search term for `key`. Unknown keys search for the key itself, so a
    /// class the catalog has never heard of still produces usable results.
    pub fn search_term<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries
            .get(key)
            .map(|entry| entry.search_term.as_str())
            .unwrap_or(key)
    }

    pub fn is_fixed_pack(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.fixed_pack)
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
