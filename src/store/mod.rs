//! Read-only data sources and the context that carries them
//!
//! `DataContext` is built once at start and shared by `Arc`. Nothing in the
//! pipeline mutates it, so no locking is involved.

pub mod memory;
pub mod statistics;

pub use memory::{AffectedProduct, AssumptionRecord, DesignChange, ExplicitMemory, ProductRecord};
pub use statistics::{
    CategoryYearStats, FinancialMetrics, PremiumStats, ProductYearStats, RiskMetrics,
    StatisticsStore, YearStats, YearSummary,
};

use std::path::Path;
use std::sync::Arc;

use crate::error::DataError;
use crate::vocabulary::Vocabulary;

pub const VOCABULARY_FILE: &str = "vocabulary.yaml";
pub const EXPLICIT_MEMORY_FILE: &str = "explicit_memory.json";
pub const STATISTICS_FILE: &str = "statistics.json";

/// Vocabulary plus both stores
#[derive(Debug, Clone)]
pub struct DataContext {
    pub vocabulary: Arc<Vocabulary>,
    pub memory: Arc<ExplicitMemory>,
    pub statistics: Arc<StatisticsStore>,
}

impl DataContext {
    pub fn new(vocabulary: Vocabulary, memory: ExplicitMemory, statistics: StatisticsStore) -> Self {
        Self {
            vocabulary: Arc::new(vocabulary),
            memory: Arc::new(memory),
            statistics: Arc::new(statistics),
        }
    }

    /// Load the three data files from `dir`
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, DataError> {
        let dir = dir.as_ref();
        let vocabulary = Vocabulary::load(dir.join(VOCABULARY_FILE))?;
        let memory = ExplicitMemory::from_json_str(&read(&dir.join(EXPLICIT_MEMORY_FILE))?)?;
        let statistics = StatisticsStore::from_json_str(&read(&dir.join(STATISTICS_FILE))?)?;

        tracing::info!(
            data_dir = %dir.display(),
            years = statistics.years().count(),
            "Data context loaded"
        );
        Ok(Self::new(vocabulary, memory, statistics))
    }
}

fn read(path: &Path) -> Result<String, DataError> {
    std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}
