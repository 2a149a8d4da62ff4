//! Language Catalog (§4.2): an immutable `language_id -> Language` lookup
//! loaded once from a bundled TOML seed.

use std::collections::HashMap;

use judge_protocol::language::Language;
use judge_protocol::language::LanguageSummary;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CATALOG_TOML: &str = include_str!("../catalog/languages.toml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse language catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate language id {0} in catalog")]
    DuplicateId(i16),
}

#[derive(Deserialize)]
struct CatalogFile {
    language: Vec<Language>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    by_id: HashMap<i16, Language>,
}

impl Catalog {
    pub fn from_toml_str(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(raw)?;
        let mut by_id = HashMap::with_capacity(file.language.len());
        for lang in file.language {
            if by_id.insert(lang.id, lang).is_some() {
                return Err(CatalogError::DuplicateId(by_id.len() as i16));
            }
        }
        Ok(Self { by_id })
    }

    /// Loads the catalog bundled with the binary at compile time.
    pub fn load_default() -> Result<Self, CatalogError> {
        Self::from_toml_str(DEFAULT_CATALOG_TOML)
    }

    pub fn get(&self, id: i16) -> Option<&Language> {
        self.by_id.get(&id)
    }

    pub fn list(&self) -> Vec<LanguageSummary> {
        let mut items: Vec<LanguageSummary> = self.by_id.values().map(LanguageSummary::from).collect();
        items.sort_by_key(|l| l.id);
        items
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn loads_the_bundled_catalog_without_duplicates() {
        let catalog = Catalog::load_default().unwrap();
        assert!(catalog.get(1).is_some());
        assert_eq!(catalog.get(1).unwrap().name, "Python");
        assert!(catalog.get(9999).is_none());
        assert!(catalog.list().len() >= 8);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = r#"
            [[language]]
            id = 1
            name = "A"
            version = "1"
            source_filename = "a"
            run_cmd = "a"

            [[language]]
            id = 1
            name = "B"
            version = "1"
            source_filename = "b"
            run_cmd = "b"
        "#;
        assert!(matches!(Catalog::from_toml_str(raw), Err(CatalogError::DuplicateId(_))));
    }
}
