pub mod config;
pub mod error;
pub mod names;
pub mod report;
pub mod runner;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use names::ResourceNames;
pub use report::RunReport;
pub use runner::Pipeline;
