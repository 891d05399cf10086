//! Opportunistic reads of the page's client-side storage.
//!
//! Nothing here depends on the site's storage layout being stable: keys are
//! picked by substring, values that are not JSON are skipped, and the
//! artifact search only looks for objects that carry an artifact marker.

use serde_json::Value;
use tracing::{debug, warn};

use crate::port::ClientStorage;

/// Recursion bound for the artifact search.
pub const MAX_SCAN_DEPTH: usize = 10;

const CONVERSATION_KEY_MARKERS: &[&str] = &["conversation", "chat"];
const CONVERSATION_KEY_PREFIX: &str = "lastActiveOrg";
const FILE_KEY_MARKERS: &[&str] = &["file", "upload", "attachment"];

/// Artifact-shaped record found in storage. Fields are raw; the artifact
/// extractor applies fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredArtifact {
    pub title: Option<String>,
    pub language: Option<String>,
    pub content: Option<String>,
    pub type_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub key: String,
    pub name: Option<String>,
    pub content: String,
}

pub struct StorageScanner<'a> {
    storage: &'a dyn ClientStorage,
}

impl<'a> StorageScanner<'a> {
    pub fn new(storage: &'a dyn ClientStorage) -> Self {
        Self { storage }
    }

    pub fn conversation_keys(&self) -> Vec<String> {
        self.storage
            .keys()
            .into_iter()
            .filter(|k| {
                CONVERSATION_KEY_MARKERS.iter().any(|m| k.contains(m))
                    || k.starts_with(CONVERSATION_KEY_PREFIX)
            })
            .collect()
    }

    pub fn file_keys(&self) -> Vec<String> {
        self.storage
            .keys()
            .into_iter()
            .filter(|k| FILE_KEY_MARKERS.iter().any(|m| k.contains(m)))
            .collect()
    }

    /// Every artifact-marked object under the conversation keys.
    pub fn artifact_records(&self) -> Vec<StoredArtifact> {
        let mut found = Vec::new();
        for key in self.conversation_keys() {
            let Some(value) = self.read_json(&key) else {
                continue;
            };
            let before = found.len();
            collect_artifacts(&value, 0, &mut found);
            debug!(key = %key, found = found.len() - before, "scanned storage entry");
        }
        found
    }

    /// Entries under file-like keys that carry inline content.
    pub fn file_records(&self) -> Vec<StoredFile> {
        let mut files = Vec::new();
        for key in self.file_keys() {
            let Some(value) = self.read_json(&key) else {
                continue;
            };
            let Some(content) = string_field(&value, &["content", "text"]) else {
                continue;
            };
            files.push(StoredFile {
                name: string_field(&value, &["name", "filename"]),
                content,
                key,
            });
        }
        files
    }

    fn read_json(&self, key: &str) -> Option<Value> {
        let raw = self.storage.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key = %key, error = %err, "skipping storage entry that is not JSON");
                None
            }
        }
    }
}

fn collect_artifacts(value: &Value, depth: usize, out: &mut Vec<StoredArtifact>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            let marked = map.get("type").and_then(Value::as_str) == Some("artifact")
                || map.get("artifact").is_some_and(is_truthy);
            if marked {
                out.push(StoredArtifact {
                    title: string_field(value, &["title", "identifier"]),
                    language: string_field(value, &["language"]),
                    content: string_field(value, &["content", "text"]),
                    type_tag: string_field(value, &["type"]),
                });
            }
            for child in map.values() {
                if child.is_object() || child.is_array() {
                    collect_artifacts(child, depth + 1, out);
                }
            }
        }
        Value::Array(items) => {
            for child in items {
                if child.is_object() || child.is_array() {
                    collect_artifacts(child, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

/// First non-empty string among `fields`.
fn string_field(value: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| value.get(*f).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct MapStorage(BTreeMap<String, String>);

    impl ClientStorage for MapStorage {
        fn keys(&self) -> Vec<String> {
            self.0.keys().cloned().collect()
        }
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
    }

    fn storage(entries: &[(&str, String)]) -> MapStorage {
        MapStorage(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn finds_nested_artifacts_under_conversation_keys() {
        let data = json!({
            "messages": [
                {"content": [{"type": "artifact", "identifier": "demo", "language": "python", "content": "print(1)"}]},
                {"artifact": true, "title": "chart", "text": "<svg/>", "type": "image/svg+xml"},
                {"artifact": 0, "title": "not marked"}
            ]
        });
        let store = storage(&[
            ("conversation-123", data.to_string()),
            ("theme", json!({"type": "artifact", "content": "ignored"}).to_string()),
        ]);
        let records = StorageScanner::new(&store).artifact_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title.as_deref(), Some("demo"));
        assert_eq!(records[0].content.as_deref(), Some("print(1)"));
        assert_eq!(records[1].type_tag.as_deref(), Some("image/svg+xml"));
        assert_eq!(records[1].content.as_deref(), Some("<svg/>"));
    }

    #[test]
    fn depth_bound_stops_runaway_nesting() {
        let mut value = json!({"type": "artifact", "content": "deep"});
        for _ in 0..(MAX_SCAN_DEPTH + 5) {
            value = json!({ "next": value });
        }
        let store = storage(&[("chat", value.to_string())]);
        assert!(StorageScanner::new(&store).artifact_records().is_empty());

        let mut shallow = json!({"type": "artifact", "content": "shallow"});
        for _ in 0..MAX_SCAN_DEPTH {
            shallow = json!({ "next": shallow });
        }
        let store = storage(&[("chat", shallow.to_string())]);
        assert_eq!(StorageScanner::new(&store).artifact_records().len(), 1);
    }

    #[test]
    fn file_records_need_content_and_skip_garbage() {
        let store = storage(&[
            ("upload:a", json!({"name": "notes.txt", "content": "hello"}).to_string()),
            ("upload:b", json!({"name": "empty.txt"}).to_string()),
            ("file-cache", "not json".to_string()),
            ("attachment-x", json!({"text": "raw"}).to_string()),
        ]);
        let files = StorageScanner::new(&store).file_records();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, None);
        assert_eq!(files[0].content, "raw");
        assert_eq!(files[1].name.as_deref(), Some("notes.txt"));
    }
}
