//! Input file discovery.
//!
//! Walks the configured data directory and returns the JSON files to import,
//! optionally narrowed to a reproducible random sample plus an allow-list of
//! files that are always kept.

use anyhow::{bail, Result};
use globset::{Glob, GlobMatcher};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ImportConfig;

/// List the files under `import.data_dir` matching `import.pattern`.
///
/// Paths come back sorted by path so every run sees the same order. When
/// `sample_size` is set, a seeded sample of that many files is kept (still in
/// path order). Every file named in `include` is added on top, sampled or not.
///
/// A missing directory is an error; an empty match is not.
pub fn discover_files(import: &ImportConfig) -> Result<Vec<PathBuf>> {
    let root = &import.data_dir;
    if !root.is_dir() {
        bail!("Data directory does not exist: {}", root.display());
    }

    let matcher = Glob::new(&import.pattern)?.compile_matcher();

    let mut walker = WalkDir::new(root).sort_by_file_name().min_depth(1);
    if !import.recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matches_pattern(&matcher, root, entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!(dir = %root.display(), matched = files.len(), "scanned data directory");

    if let Some(size) = import.sample_size {
        files = sample_files(files, size, import.sample_seed);
    }
    Ok(add_includes(files, &import.include, root))
}

/// The pattern applies to the file name, or to the relative path when it
/// contains a separator (e.g. `**/airline_*.json`).
fn matches_pattern(matcher: &GlobMatcher, root: &Path, path: &Path) -> bool {
    if matcher.glob().glob().contains('/') {
        let relative = path.strip_prefix(root).unwrap_or(path);
        matcher.is_match(relative)
    } else {
        path.file_name()
            .map(|name| matcher.is_match(name))
            .unwrap_or(false)
    }
}

/// Keep `size` files picked by a seeded RNG, in their original order.
fn sample_files(files: Vec<PathBuf>, size: usize, seed: u64) -> Vec<PathBuf> {
    if size >= files.len() {
        return files;
    }
    let mut keep = vec![false; files.len()];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for idx in rand::seq::index::sample(&mut rng, files.len(), size) {
        keep[idx] = true;
    }
    files
        .into_iter()
        .zip(keep)
        .filter_map(|(path, k)| k.then_some(path))
        .collect()
}

/// Add every allow-listed file from `root`, whether or not it was sampled
/// or matched the pattern.
fn add_includes(mut files: Vec<PathBuf>, include: &[String], root: &Path) -> Vec<PathBuf> {
    if include.is_empty() {
        return files;
    }
    let mut present: HashSet<PathBuf> = files.iter().cloned().collect();
    for name in include {
        let path = root.join(name);
        if present.contains(&path) {
            continue;
        }
        if path.is_file() {
            present.insert(path.clone());
            files.push(path);
        } else {
            warn!(file = %name, "included file not found in data directory");
        }
    }
    files.sort();
    files
}
