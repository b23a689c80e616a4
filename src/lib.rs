//! Static coverage-analysis core: given a source file, determines the
//! executable statement lines, the lines excluded by pragma, the multi-line
//! statement grouping, and the full set of control-flow arcs that could
//! possibly occur at runtime — the static model a runtime trace is later
//! diffed against.

pub mod config;
pub mod cst;
pub mod error;
pub mod facade;
pub mod multiline;
pub mod source_analyzer;
pub mod structural;
pub mod unit;

pub use config::ExclusionConfig;
pub use error::{AnalyzerError, AnalyzerResult};
pub use facade::{format_ranges, parse_formatted_ranges, AnalysisResult, Analyzer};
pub use multiline::MultilineMap;
pub use structural::Arc;
pub use unit::CodeUnit;
