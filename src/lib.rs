//! Builds the suburb listing data file from an ABS Census DataPack:
//! download, extract, load the geography, population, income and commute
//! tables, join them and keep the most populous regions as YAML cards.

pub mod config;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod process;

pub use config::Config;
pub use error::{PipelineError, Stage};
pub use process::join::SuburbCard;
