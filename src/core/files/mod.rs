//! Plain text, YAML and JSON file helpers.
//!
//! Reads of missing or empty files give `Ok(None)` rather than an error, and
//! writes are skipped (also `Ok(None)`) when the target directory does not
//! exist or there is nothing to write.

use crate::core::structures::resolve_tags;
use humansize::{format_size, DECIMAL};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns the file content, or `None` if the file does not exist or is
/// empty.
pub fn read_file(path: impl AsRef<Path>) -> Result<Option<String>, FileError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;
    if content.is_empty() {
        return Ok(None);
    }
    Ok(Some(content))
}

pub fn read_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Option<T>, FileError> {
    match read_file(path)? {
        Some(content) => Ok(Some(serde_yaml::from_str(&content)?)),
        None => Ok(None),
    }
}

/// Reads a YAML document and resolves its `!str_join` / `!loc_join` tags
/// against `locations`.
pub fn read_yaml_with_tags(
    path: impl AsRef<Path>,
    locations: &HashMap<String, String>,
) -> Result<Option<serde_yaml::Value>, FileError> {
    let value: Option<serde_yaml::Value> = read_yaml(path)?;
    Ok(value.map(|v| resolve_tags(v, locations)))
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Option<T>, FileError> {
    match read_file(path)? {
        Some(content) => Ok(Some(serde_json::from_str(&content)?)),
        None => Ok(None),
    }
}

/// Writes `content` and returns the number of bytes written.
///
/// The enclosing directory must already exist.
pub fn write_file(path: impl AsRef<Path>, content: &str) -> Result<Option<usize>, FileError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() || content.is_empty() {
        return Ok(None);
    }

    let parent_exists = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => true,
        Some(parent) => parent.is_dir(),
        None => false,
    };
    if !parent_exists {
        crate::log_warning!("files", "not writing {}: directory missing", path.display());
        return Ok(None);
    }

    fs::write(path, content)?;
    crate::log_debug!(
        "files",
        "wrote {} to {}",
        format_size(content.len(), DECIMAL),
        path.display()
    );
    Ok(Some(content.len()))
}

pub fn write_yaml<T: Serialize + ?Sized>(path: impl AsRef<Path>, content: &T) -> Result<Option<usize>, FileError> {
    let yaml = serde_yaml::to_string(content)?;
    write_file(path, &yaml)
}

/// JSON with four-space indentation and sorted keys.
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, content: &T) -> Result<Option<usize>, FileError> {
    // serde_json::Map is ordered by key, so a round-trip through Value sorts
    let value = serde_json::to_value(content)?;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;

    write_file(path, &String::from_utf8_lossy(&buf))
}

/// Writes YAML for `.yaml` / `.yml` paths and JSON for anything else.
pub fn write_by_extension<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    content: &T,
) -> Result<Option<usize>, FileError> {
    if is_yaml_path(path.as_ref()) {
        write_yaml(path, content)
    } else {
        write_json(path, content)
    }
}

pub fn read_by_extension<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Option<T>, FileError> {
    if is_yaml_path(path.as_ref()) {
        read_yaml(path)
    } else {
        read_json(path)
    }
}

pub fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_file(dir.path().join("nope.txt")).unwrap(), None);

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "").unwrap();
        assert_eq!(read_file(&empty).unwrap(), None);
        assert_eq!(read_json::<serde_json::Value>(&empty).unwrap(), None);
    }

    #[test]
    fn test_write_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing").join("out.txt");
        assert_eq!(write_file(&missing, "data").unwrap(), None);
        assert!(!missing.exists());

        let target = dir.path().join("out.txt");
        assert_eq!(write_file(&target, "").unwrap(), None);
        assert_eq!(write_file(&target, "data").unwrap(), Some(4));
        assert_eq!(read_file(&target).unwrap().as_deref(), Some("data"));
    }

    #[test]
    fn test_json_is_sorted_and_indented() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        write_json(&path, &json!({ "b": 1, "a": { "c": true } })).unwrap();

        let text = read_file(&path).unwrap().unwrap();
        assert_eq!(text, "{\n    \"a\": {\n        \"c\": true\n    },\n    \"b\": 1\n}");
        let back: serde_json::Value = read_json(&path).unwrap().unwrap();
        assert_eq!(back["a"]["c"], true);
    }

    #[test]
    fn test_yaml_round_trip_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts.yml");
        let data = json!({ "hosts": ["a", "b"], "count": 3 });

        assert!(write_by_extension(&path, &data).unwrap().is_some());
        let text = read_file(&path).unwrap().unwrap();
        assert!(text.contains("hosts:"));

        let back: serde_json::Value = read_by_extension(&path).unwrap().unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_read_yaml_with_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.yaml");
        fs::write(&path, "log: !loc_join [base, opskit.log]\n").unwrap();

        let mut locations = HashMap::new();
        locations.insert("base".to_string(), "/tmp/opskit".to_string());

        let value = read_yaml_with_tags(&path, &locations).unwrap().unwrap();
        assert_eq!(value["log"].as_str(), Some("/tmp/opskit/opskit.log"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_json::<serde_json::Value>(&path), Err(FileError::Json(_))));
    }
}
