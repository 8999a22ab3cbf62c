pub mod analyzer;
pub mod assisted;
pub mod config;
pub mod discovery;
pub mod enricher;
pub mod error;
pub mod gateway;
pub mod guidelines;
pub mod pipeline;
pub mod source;

pub use analyzer::report::{AnalysisReport, Finding, FindingKind, Metrics, Severity};
pub use analyzer::RuleContext;
pub use config::{AnalysisConfig, RankingOrder};
pub use error::{Result, ScanError};
pub use gateway::{ContentGenerator, Gateway};
pub use guidelines::Guidelines;
pub use pipeline::{EventStream, Pipeline, PipelineEvent};
pub use source::{GitSource, LocalSource, SourceProvider, SourceTree};
