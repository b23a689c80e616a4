//! Analyzer façade (spec.md §4.4): joins the source and structural passes,
//! collapses multi-line statements to their first line, and diffs against a
//! runtime-collected execution record.

use std::collections::BTreeSet;
use std::sync::Arc as StdArc;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::config::ExclusionConfig;
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::multiline::MultilineMap;
use crate::source_analyzer::{analyze_source, build_multiline_map};
use crate::structural::{analyze_structure, Arc};
use crate::unit::CodeUnit;

/// The core's output for one `CodeUnit`: statements and excluded lines
/// sorted ascending, `arcs` a set, as spec.md §3 requires of
/// `AnalysisResult`.
pub struct AnalysisResult {
    statement_starts: BTreeSet<u32>,
    excluded: BTreeSet<u32>,
    docstrings: BTreeSet<u32>,
    multiline: MultilineMap,
    arcs: BTreeSet<Arc>,
}

impl AnalysisResult {
    /// The statement starts minus docstrings minus excluded, each line
    /// mapped to its multi-line statement's first line, deduplicated and
    /// sorted.
    pub fn executable_statements(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self
            .statement_starts
            .iter()
            .filter(|l| !self.docstrings.contains(l) && !self.excluded.contains(l))
            .map(|&l| self.multiline.first_line(l))
            .collect();
        set.into_iter().collect()
    }

    /// `excluded`, each line mapped to its multi-line statement's first
    /// line.
    pub fn excluded_lines(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self
            .excluded
            .iter()
            .map(|&l| self.multiline.first_line(l))
            .collect();
        set.into_iter().collect()
    }

    pub fn arc_possibilities(&self) -> Vec<Arc> {
        self.arcs.iter().copied().collect()
    }

    /// `executable ∖ executed`.
    pub fn missing(&self, executed_lines: &BTreeSet<u32>) -> Vec<u32> {
        self.executable_statements()
            .into_iter()
            .filter(|l| !executed_lines.contains(l))
            .collect()
    }

    /// `possibilities ∖ executed`, restricted to arcs whose endpoints are
    /// both in the executable set (or the `-1` sentinel). Does not apply
    /// the partial-branch pattern, since that needs the unit's source
    /// lines; use `Analyzer::arcs_missing` for that.
    pub fn arcs_missing(&self, executed_arcs: &BTreeSet<Arc>) -> Vec<Arc> {
        let executable: BTreeSet<u32> = self.executable_statements().into_iter().collect();
        self.arcs
            .iter()
            .filter(|a| !executed_arcs.contains(a))
            .filter(|a| endpoint_is_executable(a.from, &executable))
            .filter(|a| endpoint_is_executable(a.to, &executable))
            .copied()
            .collect()
    }

    /// `executed ∖ possibilities` — arcs the runtime reported that the
    /// static model never predicted. A non-empty result against a faithful
    /// trace indicates either an analyzer bug or a compiler-version
    /// surprise (spec.md §8, testable property 6).
    pub fn arcs_unpredicted(&self, executed_arcs: &BTreeSet<Arc>) -> Vec<Arc> {
        executed_arcs
            .iter()
            .filter(|a| !self.arcs.contains(a))
            .copied()
            .collect()
    }

    /// The missing set compressed into comma-separated ranges, e.g.
    /// `{4,5,6,9} -> "4-6, 9"`.
    pub fn missing_formatted(&self, executed_lines: &BTreeSet<u32>) -> String {
        format_ranges(&self.missing(executed_lines))
    }

    fn check_consistency(&self, path: &std::path::Path) -> AnalyzerResult<()> {
        for arc in &self.arcs {
            if arc.from != -1 && !self.statement_starts.contains(&(arc.from as u32)) {
                return Err(AnalyzerError::internal_consistency(
                    path.to_path_buf(),
                    format!("arc origin line {} is not a known statement start", arc.from),
                ));
            }
            if arc.to != -1 && !self.statement_starts.contains(&(arc.to as u32)) {
                return Err(AnalyzerError::internal_consistency(
                    path.to_path_buf(),
                    format!(
                        "arc destination line {} is not a known statement start",
                        arc.to
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn endpoint_is_executable(line: i64, executable: &BTreeSet<u32>) -> bool {
    line == -1 || executable.contains(&(line as u32))
}

/// Compresses a sorted, deduplicated set of line numbers into
/// comma-separated ranges.
pub fn format_ranges(lines: &[u32]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, hi)) if *hi + 1 == line => *hi = line,
            _ => ranges.push((line, line)),
        }
    }
    ranges
        .into_iter()
        .map(|(lo, hi)| if lo == hi { lo.to_string() } else { format!("{lo}-{hi}") })
        .collect::<Vec<_>>()
        .join(", ")
}

/// The inverse of `format_ranges`/`missing_formatted`: parses a
/// comma-separated range string back into the set of line numbers it
/// denotes. Used by tests to check the round-trip (spec.md §8, testable
/// property 7) and by any caller that persists the formatted string rather
/// than the raw set.
pub fn parse_formatted_ranges(text: &str) -> AnalyzerResult<BTreeSet<u32>> {
    let mut lines = BTreeSet::new();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(lines);
    }
    for part in trimmed.split(',') {
        let part = part.trim();
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo
                    .trim()
                    .parse()
                    .map_err(|_| AnalyzerError::config(format!("bad range start: {part}")))?;
                let hi: u32 = hi
                    .trim()
                    .parse()
                    .map_err(|_| AnalyzerError::config(format!("bad range end: {part}")))?;
                for l in lo..=hi {
                    lines.insert(l);
                }
            }
            None => {
                let l: u32 = part
                    .parse()
                    .map_err(|_| AnalyzerError::config(format!("bad line number: {part}")))?;
                lines.insert(l);
            }
        }
    }
    Ok(lines)
}

/// Session-level façade: owns the exclusion configuration and a per-session
/// cache of `AnalysisResult`s keyed by canonical path, mirroring the
/// source's module-level cache now re-implemented as a map owned by this
/// object rather than global state (spec.md §9).
pub struct Analyzer {
    config: ExclusionConfig,
    cache: DashMap<std::path::PathBuf, StdArc<AnalysisResult>>,
}

impl Analyzer {
    pub fn new(config: ExclusionConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
        }
    }

    /// Runs both passes over `unit` and merges their output, consulting
    /// (and populating) the per-session cache.
    pub fn analyze(&self, unit: &CodeUnit) -> AnalyzerResult<StdArc<AnalysisResult>> {
        let key = unit.canonical_path();
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let exclude_re = self.config.compiled()?;
        let source_sets = analyze_source(unit, exclude_re.as_ref());
        let structural = analyze_structure(unit);

        let result = AnalysisResult {
            statement_starts: structural.statement_starts,
            excluded: source_sets.excluded,
            docstrings: source_sets.docstrings,
            multiline: build_multiline_map(&source_sets.multiline_spans),
            arcs: structural.arcs,
        };
        result.check_consistency(unit.path())?;

        let result = StdArc::new(result);
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// Analyzes every unit in `units` in parallel (spec.md §5: "Multiple
    /// CodeUnits may be analyzed in parallel... no shared mutable state").
    /// Each thread owns its own unit; only the cache insertion is shared,
    /// and `DashMap` makes that safe.
    pub fn analyze_many(&self, units: &[CodeUnit]) -> Vec<AnalyzerResult<StdArc<AnalysisResult>>> {
        units.par_iter().map(|u| self.analyze(u)).collect()
    }

    /// Arc-missing computation that can actually honor the partial-branch
    /// pattern, since it needs the unit's source lines. `arcs_missing` on
    /// `AnalysisResult` alone cannot see line text, so it never filters by
    /// partial-branch; this is the real entry point callers should use.
    pub fn arcs_missing(
        &self,
        unit: &CodeUnit,
        result: &AnalysisResult,
        executed_arcs: &BTreeSet<Arc>,
    ) -> AnalyzerResult<Vec<Arc>> {
        let partial_re = self.config.compiled_partial_branch()?;
        let executable: BTreeSet<u32> = result.executable_statements().into_iter().collect();
        let lines = unit.lines();
        let matches_partial = |line: i64| -> bool {
            let Some(re) = &partial_re else { return false };
            if line == -1 {
                return false;
            }
            let first = result.multiline.first_line(line as u32);
            lines
                .get(first.saturating_sub(1) as usize)
                .map(|text| re.is_match(text))
                .unwrap_or(false)
        };
        Ok(result
            .arcs
            .iter()
            .filter(|a| !executed_arcs.contains(a))
            .filter(|a| endpoint_is_executable(a.from, &executable))
            .filter(|a| endpoint_is_executable(a.to, &executable))
            .filter(|a| !matches_partial(a.from) && !matches_partial(a.to))
            .copied()
            .collect())
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
