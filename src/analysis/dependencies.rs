//! File-level dependency impact analysis.
//!
//! A line scan over quoted import specifiers (`import`, `use`, `require`,
//! `from "..."`), not a real parser — good enough to rank how disruptive a
//! change to each file would be. Dependents are cross-referenced within the
//! analyzed set only.
//!
//! Unresolvable paths are never dropped and never fail the call: they come
//! back with empty sets and a zero score so the caller sees every input
//! accounted for.

use std::collections::BTreeSet;
use std::path::Path;

use super::DependencyNode;

const DEPENDENT_WEIGHT: f64 = 2.0;
const DEPENDENCY_WEIGHT: f64 = 0.5;
const LINE_WEIGHT: f64 = 0.1;

/// Resolve dependency/dependent sets and impact scores for `file_paths`
/// (relative to `repo_path`). Output preserves input order.
pub fn analyze_dependencies(repo_path: &Path, file_paths: &[String]) -> Vec<DependencyNode> {
    struct Scanned {
        path: String,
        dependencies: BTreeSet<String>,
        line_count: usize,
        readable: bool,
    }

    let scanned: Vec<Scanned> = file_paths
        .iter()
        .map(|rel| match std::fs::read_to_string(repo_path.join(rel)) {
            Ok(content) => Scanned {
                path: rel.clone(),
                dependencies: extract_dependencies(&content),
                line_count: content.lines().count(),
                readable: true,
            },
            Err(_) => Scanned {
                path: rel.clone(),
                dependencies: BTreeSet::new(),
                line_count: 0,
                readable: false,
            },
        })
        .collect();

    scanned
        .iter()
        .map(|file| {
            let dependents: BTreeSet<String> = scanned
                .iter()
                .filter(|other| {
                    other.path != file.path
                        && other
                            .dependencies
                            .iter()
                            .any(|spec| specifier_matches(spec, &file.path))
                })
                .map(|other| other.path.clone())
                .collect();

            let impact_score = if file.readable {
                DEPENDENT_WEIGHT * dependents.len() as f64
                    + DEPENDENCY_WEIGHT * file.dependencies.len() as f64
                    + LINE_WEIGHT * file.line_count as f64
            } else {
                0.0
            };

            DependencyNode {
                name: basename(&file.path),
                path: file.path.clone(),
                node_type: "file".to_string(),
                dependencies: file.dependencies.clone(),
                dependents,
                impact_score,
            }
        })
        .collect()
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Collect quoted specifiers from import-like lines.
fn extract_dependencies(content: &str) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    for line in content.lines() {
        let trimmed = line.trim();
        let import_like = trimmed.starts_with("import ")
            || trimmed.starts_with("use ")
            || trimmed.starts_with("from ")
            || trimmed.contains("require(");
        if !import_like {
            continue;
        }
        if let Some(spec) = extract_quoted(trimmed) {
            deps.insert(spec);
        }
    }
    deps
}

/// First single- or double-quoted token on the line, if any.
fn extract_quoted(line: &str) -> Option<String> {
    for quote in ['"', '\''] {
        let mut parts = line.split(quote);
        let _before = parts.next()?;
        if let Some(inner) = parts.next() {
            if !inner.is_empty() {
                return Some(inner.to_string());
            }
        }
    }
    None
}

/// Does an import specifier plausibly refer to `target_path`?
///
/// Compares the specifier (relative prefixes stripped) against the target
/// path with its extension removed, e.g. `./types/index` matches
/// `src/types/index.ts`.
fn specifier_matches(spec: &str, target_path: &str) -> bool {
    let spec = spec.trim_start_matches("./").trim_start_matches("../");
    if spec.is_empty() {
        return false;
    }
    let target = target_path
        .rsplit_once('.')
        .map_or(target_path, |(stem, _ext)| stem);
    target == spec || target.ends_with(&format!("/{spec}"))
}
