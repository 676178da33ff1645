//! Recording loader.
//!
//! A recording is the JSON document exported by a browser recorder:
//! `{ "title": ..., "steps": [ { "type": "change", "selectors": [...], "value": "..." }, ... ] }`.
//! The loader keeps the parsed document verbatim next to a typed view of the
//! steps, so the payload can embed the original without re-serializing it
//! through our own types.

use crate::errors::CredmapError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub const CHANGE_STEP: &str = "change";

/// One selector entry: either a single selector string or a chain of
/// selectors that pierce shadow roots / frames in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorEntry {
    Single(String),
    Chain(Vec<String>),
}

/// The ordered selector list identifying the element a step acted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorDescriptor(pub Vec<SelectorEntry>);

impl SelectorDescriptor {
    pub fn entries(&self) -> &[SelectorEntry] {
        &self.0
    }

    /// First selector string, used as a human-readable label.
    pub fn primary(&self) -> Option<&str> {
        self.0.iter().find_map(|entry| match entry {
            SelectorEntry::Single(value) => Some(value.as_str()),
            SelectorEntry::Chain(chain) => chain.first().map(String::as_str),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Change,
    Other(String),
}

impl StepKind {
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Change)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub selectors: Option<SelectorDescriptor>,
    /// Entered text. Non-string values are not treated as entered text.
    pub value: Option<String>,
}

impl Step {
    fn other(kind: String) -> Self {
        Self {
            kind: StepKind::Other(kind),
            selectors: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    document: Value,
    steps: Vec<Step>,
}

impl Recording {
    /// The document exactly as it was parsed.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn title(&self) -> Option<&str> {
        self.document.get("title").and_then(Value::as_str)
    }

    pub fn change_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|step| step.kind.is_change())
    }
}

pub fn load(raw: &str) -> Result<Recording, CredmapError> {
    let document: Value = serde_json::from_str(raw)
        .map_err(|e| CredmapError::MalformedInput(format!("invalid json: {e}")))?;
    let root = document.as_object().ok_or_else(|| {
        CredmapError::MalformedInput("recording root must be an object".to_string())
    })?;
    let raw_steps = root
        .get("steps")
        .ok_or_else(|| CredmapError::MalformedInput("missing steps".to_string()))?
        .as_array()
        .ok_or_else(|| CredmapError::MalformedInput("steps must be an array".to_string()))?;

    let steps = raw_steps
        .iter()
        .enumerate()
        .map(|(index, step)| parse_step(index, step))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Recording { document, steps })
}

pub fn load_bytes(raw: &[u8]) -> Result<Recording, CredmapError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| CredmapError::MalformedInput(format!("recording is not utf-8: {e}")))?;
    load(text)
}

pub async fn load_file(path: &Path) -> Result<Recording, CredmapError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CredmapError::Io(format!("{}: {e}", path.display())))?;
    load_bytes(&bytes)
}

/// Only `change` steps are held to a shape. Anything else becomes an opaque
/// `Other` step with no selectors.
fn parse_step(index: usize, value: &Value) -> Result<Step, CredmapError> {
    let Some(object) = value.as_object() else {
        return Ok(Step::other(String::new()));
    };
    match object.get("type") {
        Some(Value::String(kind)) if kind == CHANGE_STEP => {}
        Some(Value::String(kind)) => return Ok(Step::other(kind.clone())),
        _ => return Ok(Step::other(String::new())),
    }

    Ok(Step {
        kind: StepKind::Change,
        selectors: parse_selectors(index, object)?,
        value: object
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_selectors(
    index: usize,
    object: &Map<String, Value>,
) -> Result<Option<SelectorDescriptor>, CredmapError> {
    match object.get("selectors") {
        None | Some(Value::Null) => Ok(None),
        Some(selectors) => serde_json::from_value(selectors.clone())
            .map(Some)
            .map_err(|_| {
                CredmapError::MalformedInput(format!(
                    "steps[{index}].selectors must be a list of selectors or selector chains"
                ))
            }),
    }
}
