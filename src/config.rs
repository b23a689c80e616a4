//! Exclusion configuration: the one piece of product-facing configuration
//! the core actually owns (spec §6). Everything else — CLI flags, plugin
//! loading, module discovery — belongs to the caller.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{AnalyzerError, AnalyzerResult};

/// User-supplied exclusion patterns, loadable from a TOML file.
///
/// `exclude` lines matching any pattern are removed from the executable set
/// (and, for suite headers, the whole suite). `partial_branch` is a
/// companion pattern coveragepy documents alongside it: a line matching it
/// is still executable, but arcs ending or starting on it are dropped from
/// `arcs_missing` — it marks a branch the author has declared need not be
/// exercised both ways (e.g. an `if TYPE_CHECKING:` guard).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExclusionConfig {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub partial_branch: Vec<String>,
}

impl ExclusionConfig {
    /// A config with a single exclusion pattern and no partial-branch
    /// pattern, the common case.
    pub fn single(pattern: impl Into<String>) -> Self {
        Self {
            exclude: vec![pattern.into()],
            partial_branch: Vec::new(),
        }
    }

    pub fn from_toml_str(text: &str) -> AnalyzerResult<Self> {
        toml::from_str(text).map_err(|e| AnalyzerError::config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> AnalyzerResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|_| AnalyzerError::no_source(path.as_ref().to_path_buf()))?;
        Self::from_toml_str(&text)
    }

    /// One regex alternating every `exclude` pattern, or `None` if unset
    /// (spec default: no lines excluded).
    pub fn compiled(&self) -> AnalyzerResult<Option<Regex>> {
        compile_alternation(&self.exclude)
    }

    pub fn compiled_partial_branch(&self) -> AnalyzerResult<Option<Regex>> {
        compile_alternation(&self.partial_branch)
    }
}

fn compile_alternation(patterns: &[String]) -> AnalyzerResult<Option<Regex>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let joined = patterns
        .iter()
        .map(|p| format!("(?:{p})"))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Some(Regex::new(&joined)?))
}
