use crate::errors::{CredmapError, SynthesisError};
use crate::field::{canonical_json, FieldId};
use crate::options::PasswordOptions;
use crate::partition::{BucketId, Partition, RoleName, NEW_PASSWORD_ROLE, USERNAME_ROLE};
use crate::readiness::{check, ReadinessPolicy};
use crate::recording::{Recording, SelectorDescriptor};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

/// Payload keys that role names may not shadow.
pub const RESERVED_KEYS: [&str; 4] = ["username", "password", "recording", "passwordOptions"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisPlan {
    pub username_role: RoleName,
    /// Role whose first field supplies the payload's `password`. This is the
    /// new password; the current password role only appears in the mappings.
    pub password_role: RoleName,
    pub readiness: ReadinessPolicy,
}

impl Default for SynthesisPlan {
    fn default() -> Self {
        Self {
            username_role: RoleName::new(USERNAME_ROLE),
            password_role: RoleName::new(NEW_PASSWORD_ROLE),
            readiness: ReadinessPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMapping {
    pub role: RoleName,
    pub selectors: Vec<SelectorDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub username: String,
    pub password: String,
    pub recording: Value,
    pub mappings: Vec<RoleMapping>,
    pub password_options: PasswordOptions,
}

impl Payload {
    pub fn mapping(&self, role: &str) -> Option<&[SelectorDescriptor]> {
        self.mappings
            .iter()
            .find(|mapping| mapping.role.as_str() == role)
            .map(|mapping| mapping.selectors.as_slice())
    }

    pub fn to_pretty_json(&self) -> Result<String, CredmapError> {
        serde_json::to_string_pretty(self).map_err(|e| CredmapError::Output(e.to_string()))
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4 + self.mappings.len()))?;
        map.serialize_entry("username", &self.username)?;
        map.serialize_entry("password", &self.password)?;
        map.serialize_entry("recording", &self.recording)?;
        for mapping in &self.mappings {
            map.serialize_entry(mapping.role.as_str(), &mapping.selectors)?;
        }
        map.serialize_entry("passwordOptions", &self.password_options)?;
        map.end()
    }
}

/// Value of the first `change` step whose selectors encode to `field`, or an
/// empty string when no step matches.
pub fn resolve_value(recording: &Recording, field: &FieldId) -> String {
    recording
        .change_steps()
        .find(|step| {
            step.selectors
                .as_ref()
                .is_some_and(|selectors| canonical_json(selectors) == field.as_str())
        })
        .and_then(|step| step.value.clone())
        .unwrap_or_default()
}

fn resolve_role(recording: &Recording, partition: &Partition, role: &RoleName) -> String {
    partition
        .first_in(role)
        .map(|field| resolve_value(recording, field))
        .unwrap_or_default()
}

pub fn synthesize(
    recording: &Recording,
    partition: &Partition,
    plan: &SynthesisPlan,
    options: &PasswordOptions,
) -> Result<Payload, SynthesisError> {
    let readiness = check(partition, &plan.readiness);
    if !readiness.is_ready() {
        return Err(SynthesisError::NotReady(readiness));
    }

    let mappings = partition
        .roles()
        .iter()
        .map(|spec| RoleMapping {
            role: spec.name.clone(),
            selectors: partition
                .bucket(&BucketId::Role(spec.name.clone()))
                .unwrap_or_default()
                .iter()
                .map(|field| field.descriptor().clone())
                .collect(),
        })
        .collect();

    Ok(Payload {
        username: resolve_role(recording, partition, &plan.username_role),
        password: resolve_role(recording, partition, &plan.password_role),
        recording: recording.document().clone(),
        mappings,
        password_options: options.clone(),
    })
}
