//! Natural-language query understanding and retrieval dispatch
//!
//! A question flows through:
//!
//! ```text
//! extract (oracle) → resolve (vocabulary) → confirm? (oracle | caller)
//!     → plan (oracle) → execute (registry) → synthesize (oracle)
//! ```
//!
//! The oracle is the [`ai::LlmClient`] trait; [`ai::GeminiClient`] is the
//! live implementation. Data is loaded once into a [`store::DataContext`].

pub mod ai;
pub mod api;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod store;
pub mod synthesizer;
pub mod vocabulary;

pub use ai::{LlmClient, OraclePurpose};
pub use config::AppConfig;
pub use error::{PipelineError, PipelineResult, RetrievalError};
pub use pipeline::{Orchestrator, PipelineConfig, PipelineExecution, PipelineStage};
pub use registry::{Registry, RetrievalFunction, RetrievalResult};
pub use store::DataContext;
