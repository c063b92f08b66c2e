//! # Tabflow - transformations over hierarchical datasets
//!
//! Tabflow derives new datasets from existing ones (group by, sort, running
//! folds, comparisons, statistics...) and keeps the derived datasets up to
//! date when their inputs change.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │    Host     │────▶│  Operator   │────▶│   Output    │────▶│    Host     │
//! │  (context)  │     │ (transform) │     │ + MVR + name│     │  (new ctx)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                                           ▲
//!        └──── update / delete ───▶ Registry ──── re-run ────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabflow::{AttributeEvaluator, MemoryHost, Transformer, TransformerState};
//!
//! #[tokio::main]
//! async fn main() {
//!     let host = MemoryHost::new(AttributeEvaluator::new());
//!     // ... insert a context named "People" ...
//!     let state = TransformerState::new().context1("People").attribute_set1(["State"]);
//!     let output = Transformer::GroupBy.run(&state, &host).await.unwrap();
//!     println!("{}", output.output_name);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Dataset, collections, attributes, default filling
//! - [`missing`] - Missing value reports
//! - [`transform`] - Operators and the transformer catalog
//! - [`host`] - Host platform and evaluator interfaces
//! - [`registry`] - Active transformations and update propagation
//! - [`store`] - On-disk workspace
//! - [`parser`] - CSV import with auto-detection
//! - [`config`] - Environment configuration
//! - [`logs`] - Broadcast log stream

// Core modules
pub mod error;
pub mod missing;
pub mod models;

// Operators
pub mod transform;

// Host and dependency tracking
pub mod host;
pub mod registry;

// Workspace
pub mod config;
pub mod parser;
pub mod store;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CliError, CliResult, HostError, HostResult, RegistryError, RegistryResult, StoreError, StoreResult,
    TransformError, TransformResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use missing::{MissingValueLocation, MissingValueReport};
pub use models::{Attribute, AttributeType, Collection, DataContext, DataSet, Record};

// =============================================================================
// Re-exports - Transformers
// =============================================================================

pub use transform::{
    catalog_description, CodapLanguageType, OutputValue, PartitionSaveState, SingleValue, TransformFunction,
    TransformationOutput, TransformationOutputType, Transformer, TransformerState, TypeContract,
};

// =============================================================================
// Re-exports - Host
// =============================================================================

pub use host::{AttributeEvaluator, Evaluator, FnEvaluator, Host, MemoryHost};

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use registry::{
    ActiveTransformationRegistry, ActiveTransformations, ContextEvent, DatasetCreatorDescription,
    FullOverrideDescription, FullOverridePatch, Subscription, TransformationDescription, UpdateReport,
};

// =============================================================================
// Re-exports - Workspace
// =============================================================================

pub use config::EngineConfig;
pub use parser::{parse_bytes_auto, parse_csv_file_auto, CsvError, ParseResult};
pub use store::{SavedState, Workspace};

pub use logs::{LogEntry, LogLevel, LOG_BROADCASTER};
