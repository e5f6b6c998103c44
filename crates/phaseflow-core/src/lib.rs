pub mod analysis;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod gate;
pub mod io;
pub mod migrations;
pub mod paths;
pub mod retry;
pub mod state;
pub mod store;
pub mod transform;
pub mod types;
pub mod validator;
pub mod workflow;

pub use analysis::{AnalysisGateway, DeliverableAnalyzer, PhaseAnalysisBundle};
pub use config::Config;
pub use context::{EnhancedContext, EnhancedContextBuilder};
pub use engine::{PhaseTransitionEngine, TransitionResult, TransitionStage};
pub use error::{FailureKind, PhaseflowError, Result};
pub use store::{JsonFileStore, MemoryStore, StateStore};
pub use transform::{Transformer, TransformerRegistry, TransformationOutput};
pub use types::{Phase, ProjectType};
pub use workflow::PhaseWorkflow;
