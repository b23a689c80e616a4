//! `CodeUnit`: the compilation unit handed to both analysis passes.

use std::path::{Path, PathBuf};

use crate::error::{AnalyzerError, AnalyzerResult};

/// A source file together with its parsed tree, analyzed once and then
/// treated as immutable. Both the source analyzer and the structural parser
/// borrow it read-only.
pub struct CodeUnit {
    path: PathBuf,
    source: String,
    tree: tree_sitter::Tree,
}

impl CodeUnit {
    /// Read `path` from disk, normalize line endings, and parse it.
    pub fn from_path(path: impl AsRef<Path>) -> AnalyzerResult<Self> {
        let path = path.as_ref();
        let raw =
            std::fs::read(path).map_err(|_| AnalyzerError::no_source(path.to_path_buf()))?;
        let text = decode_source(&raw, path)?;
        Self::from_source(path, text)
    }

    /// Build a unit from already-decoded source text, e.g. an editor buffer
    /// the caller has in memory. `path` is used only as an identity key and
    /// for diagnostics; it need not exist on disk.
    pub fn from_source(path: impl AsRef<Path>, source: impl Into<String>) -> AnalyzerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let source = normalize_newlines(&source.into());
        let source = ensure_trailing_newline(source);

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("tree-sitter-python grammar is ABI-compatible with the linked tree-sitter");
        let tree = parser.parse(&source, None).ok_or_else(|| {
            AnalyzerError::could_not_parse(path.clone(), 1, "parser produced no tree")
        })?;

        if tree.root_node().has_error() {
            let (line, message) = first_error(&tree, &source);
            return Err(AnalyzerError::could_not_parse(path, line, message));
        }

        Ok(Self { path, source, tree })
    }

    /// Canonical absolute path, case-normalized per the platform, used as
    /// the dictionary key joining this unit's results to a runtime
    /// execution record.
    pub fn canonical_path(&self) -> PathBuf {
        std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &tree_sitter::Tree {
        &self.tree
    }

    /// The source split into physical lines, 0-indexed (line `i` is line
    /// number `i + 1`). Used by the pragma pre-scan, which matches on raw
    /// line text only.
    pub fn lines(&self) -> Vec<&str> {
        self.source.split('\n').collect()
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn ensure_trailing_newline(mut text: String) -> String {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Honors a `# -*- coding: ... -*-`-style declaration on the first two
/// lines, as the host language's encoding-declaration rule requires. Only
/// UTF-8-compatible declarations are supported by this rewrite (ASCII and
/// `utf-8` itself); anything else fails with `CouldNotParse`, since none of
/// the crates in this stack perform codec transcoding. See DESIGN.md for
/// the open-question decision.
fn decode_source(raw: &[u8], path: &Path) -> AnalyzerResult<String> {
    let declared = declared_encoding(raw);
    if let Some(enc) = &declared {
        let normalized = enc.to_ascii_lowercase().replace('_', "-");
        if normalized != "utf-8" && normalized != "utf8" && normalized != "ascii" {
            return Err(AnalyzerError::could_not_parse(
                path.to_path_buf(),
                1,
                format!("unsupported source encoding declaration: {enc}"),
            ));
        }
    }
    String::from_utf8(raw.to_vec())
        .map_err(|e| AnalyzerError::could_not_parse(path.to_path_buf(), 1, e.to_string()))
}

fn declared_encoding(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let re = regex::Regex::new(r"coding[:=]\s*([-\w.]+)").unwrap();
    for line in text.lines().take(2) {
        if let Some(caps) = re.captures(line) {
            return Some(caps[1].to_string());
        }
    }
    None
}

fn first_error(tree: &tree_sitter::Tree, source: &str) -> (u32, String) {
    let mut cursor = tree.walk();
    let mut node = tree.root_node();
    loop {
        if node.is_error() || node.is_missing() {
            break;
        }
        let mut found = false;
        if cursor.goto_first_child() {
            loop {
                if cursor.node().has_error() {
                    node = cursor.node();
                    found = true;
                    break;
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
        if !found {
            break;
        }
    }
    let line = node.start_position().row as u32 + 1;
    let text = node
        .utf8_text(source.as_bytes())
        .unwrap_or("<unreadable>")
        .lines()
        .next()
        .unwrap_or("")
        .trim();
    (line, format!("unexpected syntax near `{text}`"))
}
