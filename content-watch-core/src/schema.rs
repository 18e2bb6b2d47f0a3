//! JSON-schema validation of generated feature documents.
//!
//! Wraps the `jsonschema` crate with the feature-document schema used by the
//! extraction pipeline. A built-in schema is materialized on first use when no
//! schema file exists yet, so validation never silently passes for lack of a
//! schema.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug)]
pub enum SchemaError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// The schema document itself is not a valid JSON Schema.
    InvalidSchema(String),
    /// The instance failed validation; one message per violation.
    Invalid { document: PathBuf, errors: Vec<String> },
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::Io(e) => write!(f, "schema I/O error: {e}"),
            SchemaError::Parse(e) => write!(f, "schema JSON parse error: {e}"),
            SchemaError::InvalidSchema(msg) => write!(f, "invalid JSON schema: {msg}"),
            SchemaError::Invalid { document, errors } => write!(
                f,
                "{} failed schema validation: {}",
                document.display(),
                errors.join("; ")
            ),
        }
    }
}

impl std::error::Error for SchemaError {}

impl From<std::io::Error> for SchemaError {
    fn from(e: std::io::Error) -> Self {
        SchemaError::Io(e)
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(e: serde_json::Error) -> Self {
        SchemaError::Parse(e)
    }
}

/// The built-in schema for extracted feature documents.
pub fn default_feature_schema() -> Value {
    json!({
        "type": "object",
        "required": ["metadata", "features"],
        "properties": {
            "metadata": {
                "type": "object",
                "required": ["platform", "lastUpdated", "generatedBy", "feedSources"],
                "properties": {
                    "platform": {"type": "string"},
                    "lastUpdated": {"type": "string"},
                    "generatedBy": {"type": "string"},
                    "feedSources": {"type": "array", "items": {"type": "string"}}
                }
            },
            "features": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": [
                        "featureCapability", "category", "firstIntroduced",
                        "currentStatus", "latestUpdate", "keyMilestones",
                        "sourceLinks", "detectionDate", "lastModified"
                    ],
                    "properties": {
                        "featureCapability": {"type": "string"},
                        "category": {"type": "string"},
                        "firstIntroduced": {"type": "string"},
                        "currentStatus": {"type": "string"},
                        "latestUpdate": {"type": "string"},
                        "keyMilestones": {"type": "string"},
                        "sourceLinks": {"type": "array"},
                        "detectionDate": {"type": "string"},
                        "lastModified": {"type": "string"}
                    }
                }
            }
        }
    })
}

/// Write the built-in schema to `path` when it does not exist yet. Returns
/// whether a file was created.
pub fn ensure_schema_file(path: &Path) -> Result<bool, SchemaError> {
    if path.exists() {
        return Ok(false);
    }
    warn!(path = %path.display(), "Schema file not found, materializing built-in schema");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(&default_feature_schema())?)?;
    info!(path = %path.display(), "Created schema file");
    Ok(true)
}

/// Validate one instance against a schema value. Collects every violation
/// with its JSON path rather than stopping at the first.
pub fn validate_document(
    schema: &Value,
    document: &Value,
    document_label: &Path,
) -> Result<(), SchemaError> {
    let validator = jsonschema::options()
        .should_validate_formats(true)
        .build(schema)
        .map_err(|e| SchemaError::InvalidSchema(e.to_string()))?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|error| {
            let path = error.instance_path().to_string();
            if path.is_empty() {
                format!("$: {error}")
            } else {
                format!("${path}: {error}")
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Invalid {
            document: document_label.to_path_buf(),
            errors,
        })
    }
}

/// Load a document and a schema from disk and validate the former against the
/// latter.
pub fn validate_file(document_path: &Path, schema_path: &Path) -> Result<(), SchemaError> {
    let document: Value = serde_json::from_str(&fs::read_to_string(document_path)?)?;
    let schema: Value = serde_json::from_str(&fs::read_to_string(schema_path)?)?;
    validate_document(&schema, &document, document_path)
}
