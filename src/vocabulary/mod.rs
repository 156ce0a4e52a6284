//! Controlled vocabulary of domain entities
//!
//! Loaded once at start from `vocabulary.yaml` and immutable afterwards.
//! Resolution of free-text terms lives in [`matcher`].

pub mod matcher;
pub mod normalize;

pub use matcher::{EntityMatcher, MatchType, ResolvedMatch};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::DataError;

/// Entity types backed by vocabulary records. Years are resolved separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Assumption,
    Product,
    Category,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [Self::Assumption, Self::Product, Self::Category];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assumption => "assumption",
            Self::Product => "product",
            Self::Category => "category",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical entity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMapping {
    pub code: String,
    pub primary_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
struct VocabularyFile {
    #[serde(default)]
    assumptions: Vec<EntityMapping>,
    #[serde(default)]
    products: Vec<EntityMapping>,
    #[serde(default)]
    categories: Vec<EntityMapping>,
}

/// Vocabulary for all entity types, in file order
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    assumptions: Vec<EntityMapping>,
    products: Vec<EntityMapping>,
    categories: Vec<EntityMapping>,
}

impl Vocabulary {
    /// Build from records, enforcing code uniqueness and non-empty names
    pub fn new(
        assumptions: Vec<EntityMapping>,
        products: Vec<EntityMapping>,
        categories: Vec<EntityMapping>,
    ) -> Result<Self, DataError> {
        let vocabulary = Self {
            assumptions,
            products,
            categories,
        };
        for entity_type in EntityType::ALL {
            validate(entity_type, vocabulary.entries(entity_type))?;
        }
        Ok(vocabulary)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, DataError> {
        let file: VocabularyFile = serde_yaml::from_str(content)?;
        Self::new(file.assumptions, file.products, file.categories)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let vocabulary = Self::from_yaml_str(&content)?;
        tracing::info!(
            assumptions = vocabulary.assumptions.len(),
            products = vocabulary.products.len(),
            categories = vocabulary.categories.len(),
            "Vocabulary loaded from {}",
            path.display()
        );
        Ok(vocabulary)
    }

    pub fn entries(&self, entity_type: EntityType) -> &[EntityMapping] {
        match entity_type {
            EntityType::Assumption => &self.assumptions,
            EntityType::Product => &self.products,
            EntityType::Category => &self.categories,
        }
    }

    pub fn get(&self, entity_type: EntityType, code: &str) -> Option<&EntityMapping> {
        self.entries(entity_type).iter().find(|e| e.code == code)
    }
}

fn validate(entity_type: EntityType, entries: &[EntityMapping]) -> Result<(), DataError> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.primary_name.trim().is_empty() {
            return Err(DataError::EmptyPrimaryName {
                entity_type: entity_type.to_string(),
                code: entry.code.clone(),
            });
        }
        if !seen.insert(entry.code.as_str()) {
            return Err(DataError::DuplicateCode {
                entity_type: entity_type.to_string(),
                code: entry.code.clone(),
            });
        }
    }
    Ok(())
}
