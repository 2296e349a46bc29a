//! Document grouping.
//!
//! Parses each discovered file, derives its `{type}_{id}` key, and buckets
//! the documents into one [`TypeGroup`] per type, in first-seen order.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::{Document, TypeGroup};

/// Type groups built from one discovery pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grouping {
    groups: Vec<TypeGroup>,
    index: HashMap<String, usize>,
    /// Files that could not be read or parsed as JSON.
    pub unreadable: Vec<PathBuf>,
    /// Parsed files without a usable `id`.
    pub missing_id: Vec<PathBuf>,
    /// Documents that replaced an earlier document with the same key.
    pub overwritten: usize,
    /// Documents without a `type` that went into the default group.
    pub defaulted: usize,
}

impl Grouping {
    /// Type names in the order they were first seen.
    pub fn types(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.doc_type.as_str()).collect()
    }

    pub fn get(&self, doc_type: &str) -> Option<&TypeGroup> {
        self.index.get(doc_type).map(|&i| &self.groups[i])
    }

    pub fn groups(&self) -> &[TypeGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<TypeGroup> {
        self.groups
    }

    pub fn document_count(&self) -> usize {
        self.groups.iter().map(TypeGroup::len).sum()
    }

    /// Add a document to its type's group, creating the group on first sight.
    pub fn insert(&mut self, doc: Document) {
        let idx = match self.index.get(&doc.doc_type) {
            Some(&idx) => idx,
            None => {
                self.groups.push(TypeGroup::new(doc.doc_type.clone()));
                self.index.insert(doc.doc_type.clone(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        if self.groups[idx].insert(doc) {
            self.overwritten += 1;
        }
    }
}

/// Why a parsed value could not become a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    NotAnObject,
    MissingId,
}

/// Read, parse, and group every file in `files`, in order.
///
/// Unreadable or unparseable files are skipped (accepted loss), as are
/// documents without an `id`. Documents without a `type` land in the
/// `default_type` group.
pub fn group_files(files: &[PathBuf], default_type: &str) -> Grouping {
    group_files_with(files, default_type, |_, _| {})
}

/// Like [`group_files`], calling `on_file(n, total)` after each file.
pub fn group_files_with<F>(files: &[PathBuf], default_type: &str, mut on_file: F) -> Grouping
where
    F: FnMut(usize, usize),
{
    let mut grouping = Grouping::default();
    let total = files.len();

    for (n, path) in files.iter().enumerate() {
        match read_json(path) {
            Some(value) => match to_document(value, default_type) {
                Ok(doc) => {
                    if declared_type(&doc.body).is_none() {
                        grouping.defaulted += 1;
                    }
                    grouping.insert(doc)
                }
                Err(Rejected::MissingId) => {
                    debug!(file = %path.display(), "skipping document without id");
                    grouping.missing_id.push(path.clone());
                }
                Err(Rejected::NotAnObject) => {
                    debug!(file = %path.display(), "skipping non-object document");
                    grouping.unreadable.push(path.clone());
                }
            },
            None => grouping.unreadable.push(path.clone()),
        }
        on_file(n + 1, total);
    }

    grouping
}

fn read_json(path: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "failed to read file");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(file = %path.display(), error = %e, "skipping unparseable file");
            None
        }
    }
}

/// Extract `id` and `type` from a parsed JSON value.
///
/// String and numeric `id`/`type` values are accepted; any other `type`
/// value counts as absent.
pub fn to_document(body: Value, default_type: &str) -> Result<Document, Rejected> {
    let obj = body.as_object().ok_or(Rejected::NotAnObject)?;

    let id = obj
        .get("id")
        .and_then(scalar_text)
        .ok_or(Rejected::MissingId)?;

    let doc_type = match declared_type(&body) {
        Some(t) => t,
        None => {
            info!(id = %id, default_type, "no type specified, using default type");
            default_type.to_string()
        }
    };

    Ok(Document { id, doc_type, body })
}

fn declared_type(body: &Value) -> Option<String> {
    body.get("type").and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_files(files: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
        let tmp = TempDir::new().unwrap();
        let paths = files
            .iter()
            .map(|(name, body)| {
                let path = tmp.path().join(name);
                fs::write(&path, body).unwrap();
                path
            })
            .collect();
        (tmp, paths)
    }

    #[test]
    fn groups_by_type_with_default() {
        let (_tmp, paths) = write_files(&[
            ("a.json", r#"{"id": 1, "type": "airline"}"#),
            ("b.json", r#"{"id": 2, "type": "airline"}"#),
            ("c.json", r#"{"id": 3}"#),
        ]);

        let grouping = group_files(&paths, "_default");
        assert_eq!(grouping.types(), vec!["airline", "_default"]);

        let airline = grouping.get("airline").unwrap();
        let keys: Vec<&String> = airline.docs.keys().collect();
        assert_eq!(keys, vec!["airline_1", "airline_2"]);

        let default = grouping.get("_default").unwrap();
        assert_eq!(default.len(), 1);
        assert!(default.docs.contains_key("_default_3"));
        assert_eq!(grouping.defaulted, 1);
    }

    #[test]
    fn later_file_wins_on_duplicate_key() {
        let (_tmp, paths) = write_files(&[
            ("a.json", r#"{"id": "x", "type": "hotel", "name": "first"}"#),
            ("b.json", r#"{"id": "x", "type": "hotel", "name": "second"}"#),
        ]);

        let grouping = group_files(&paths, "_default");
        let hotel = grouping.get("hotel").unwrap();
        assert_eq!(hotel.len(), 1);
        assert_eq!(hotel.docs["hotel_x"]["name"], "second");
        assert_eq!(grouping.overwritten, 1);
    }

    #[test]
    fn missing_id_skipped_without_affecting_siblings() {
        let (_tmp, paths) = write_files(&[
            ("a.json", r#"{"type": "route"}"#),
            ("b.json", r#"{"id": 7, "type": "route"}"#),
        ]);

        let grouping = group_files(&paths, "_default");
        assert_eq!(grouping.document_count(), 1);
        assert!(grouping.get("route").unwrap().docs.contains_key("route_7"));
        assert_eq!(grouping.missing_id.len(), 1);
    }

    #[test]
    fn unparseable_files_skipped() {
        let (_tmp, paths) = write_files(&[
            ("bad.json", "{ not json"),
            ("list.json", "[1, 2]"),
            ("ok.json", r#"{"id": 1, "type": "landmark"}"#),
        ]);

        let grouping = group_files(&paths, "_default");
        assert_eq!(grouping.types(), vec!["landmark"]);
        assert_eq!(grouping.unreadable.len(), 2);
    }

    #[test]
    fn partitions_every_document_by_type() {
        let (_tmp, paths) = write_files(&[
            ("1.json", r#"{"id": 1, "type": "a"}"#),
            ("2.json", r#"{"id": 2, "type": "b"}"#),
            ("3.json", r#"{"id": 3, "type": "a"}"#),
            ("4.json", r#"{"id": 4}"#),
            ("5.json", r#"{"id": 5, "type": null}"#),
        ]);

        let grouping = group_files(&paths, "_default");
        assert_eq!(grouping.document_count(), 5);
        for group in grouping.groups() {
            for (key, body) in &group.docs {
                let doc = to_document(body.clone(), "_default").unwrap();
                assert_eq!(doc.doc_type, group.doc_type);
                assert_eq!(key, &doc.key());
            }
        }
    }

    #[test]
    fn numeric_and_string_ids() {
        let doc = to_document(json!({"id": 10, "type": "airport"}), "_default").unwrap();
        assert_eq!(doc.key(), "airport_10");
        let doc = to_document(json!({"id": "abc", "type": "airport"}), "_default").unwrap();
        assert_eq!(doc.key(), "airport_abc");
        assert_eq!(
            to_document(json!({"id": true}), "_default"),
            Err(Rejected::MissingId)
        );
        assert_eq!(
            to_document(json!("text"), "_default"),
            Err(Rejected::NotAnObject)
        );
    }

    #[test]
    fn progress_callback_sees_every_file() {
        let (_tmp, paths) = write_files(&[("a.json", "{}"), ("b.json", "{}")]);
        let mut seen = Vec::new();
        group_files_with(&paths, "_default", |n, total| seen.push((n, total)));
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }
}
