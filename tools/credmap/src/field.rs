use crate::errors::CredmapError;
use crate::recording::{Recording, SelectorDescriptor, SelectorEntry};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Canonical identifier of an input field: the compact JSON encoding of the
/// step's selector descriptor. Equality, ordering and hashing use only the
/// encoding.
#[derive(Debug, Clone)]
pub struct FieldId {
    encoded: String,
    descriptor: SelectorDescriptor,
}

impl FieldId {
    pub fn from_descriptor(descriptor: &SelectorDescriptor) -> Self {
        Self {
            encoded: canonical_json(descriptor),
            descriptor: descriptor.clone(),
        }
    }

    /// Accepts any JSON spelling of a selector descriptor and normalizes it.
    pub fn parse(text: &str) -> Result<Self, CredmapError> {
        let descriptor: SelectorDescriptor = serde_json::from_str(text)
            .map_err(|e| CredmapError::MalformedInput(format!("invalid field id: {e}")))?;
        Ok(Self::from_descriptor(&descriptor))
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn descriptor(&self) -> &SelectorDescriptor {
        &self.descriptor
    }

    pub fn short_digest(&self) -> String {
        let hash = Sha256::digest(self.encoded.as_bytes());
        hash[..4].iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl PartialEq for FieldId {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for FieldId {}

impl Hash for FieldId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl PartialOrd for FieldId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FieldId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encoded.cmp(&other.encoded)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

/// Field identifiers of every `change` step, in step order, first occurrence
/// wins. Change steps without selectors cannot be addressed and are skipped.
pub fn extract(recording: &Recording) -> Vec<FieldId> {
    let mut seen = HashSet::new();
    recording
        .change_steps()
        .filter_map(|step| step.selectors.as_ref())
        .map(FieldId::from_descriptor)
        .filter(|field| seen.insert(field.clone()))
        .collect()
}

pub fn canonical_json(descriptor: &SelectorDescriptor) -> String {
    let entries = descriptor
        .entries()
        .iter()
        .map(|entry| match entry {
            SelectorEntry::Single(value) => quote(value),
            SelectorEntry::Chain(chain) => {
                let parts = chain.iter().map(|value| quote(value)).collect::<Vec<_>>();
                format!("[{}]", parts.join(","))
            }
        })
        .collect::<Vec<_>>();
    format!("[{}]", entries.join(","))
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
