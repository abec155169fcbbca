//! Final intent document and its export
//!
//! The intent is produced by the generation service and treated as opaque,
//! except for the fields needed to name and summarize it.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// TMF921-style intent returned by the generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalIntent {
    pub name: String,

    #[serde(default)]
    pub characteristic: Vec<Value>,

    /// Everything else the generator emitted, kept verbatim
    #[serde(flatten)]
    pub document: Map<String, Value>,
}

impl FinalIntent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            characteristic: Vec::new(),
            document: Map::new(),
        }
    }

    /// Pretty-printed JSON as written on export
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize intent")
    }

    /// File name derived from the intent name
    pub fn file_name(&self) -> String {
        let stem: String = self
            .name
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = stem.trim_matches('.');
        if stem.is_empty() {
            "intent.json".to_string()
        } else {
            format!("{}.json", stem)
        }
    }
}

/// Write the intent as indented JSON into `dir`, returning the file path
pub fn export_intent(intent: &FinalIntent, dir: &Path) -> Result<PathBuf> {
    debug!(name = %intent.name, dir = %dir.display(), "export_intent: called");
    fs::create_dir_all(dir).context(format!("Failed to create export directory {}", dir.display()))?;

    let path = dir.join(intent.file_name());
    let body = intent.to_pretty_json()?;
    fs::write(&path, body).context(format!("Failed to write intent to {}", path.display()))?;

    info!(path = %path.display(), "export_intent: intent exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> FinalIntent {
        serde_json::from_value(json!({
            "name": "UserRequest_2_Services",
            "description": "camera surveillance",
            "isBundled": true,
            "characteristic": [],
            "expression": { "@type": "JsonLdExpression" }
        }))
        .unwrap()
    }

    #[test]
    fn test_opaque_fields_preserved() {
        let intent = sample();
        assert_eq!(intent.document["isBundled"], json!(true));

        let back = serde_json::to_value(&intent).unwrap();
        assert_eq!(back["expression"]["@type"], json!("JsonLdExpression"));
        assert_eq!(back["name"], json!("UserRequest_2_Services"));
    }

    #[test]
    fn test_name_is_required() {
        let result: Result<FinalIntent, _> = serde_json::from_value(json!({ "description": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_file_name_sanitized() {
        assert_eq!(sample().file_name(), "UserRequest_2_Services.json");
        assert_eq!(FinalIntent::new("Caméra / alerte").file_name(), "Cam_ra___alerte.json");
        assert_eq!(FinalIntent::new("   ").file_name(), "intent.json");
        assert_eq!(FinalIntent::new("..").file_name(), "intent.json");
    }

    #[test]
    fn test_export_writes_indented_json() {
        let temp = TempDir::new().unwrap();
        let intent = sample();

        let path = export_intent(&intent, &temp.path().join("out")).unwrap();
        assert!(path.ends_with("UserRequest_2_Services.json"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"name\""));
        let parsed: FinalIntent = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, intent);
    }
}
