//! Partition of extracted fields across role buckets plus one unassigned
//! bucket.
//!
//! Every extracted field lives in exactly one bucket, exactly once. The only
//! mutator is [`Partition::apply_move`] (see `moves.rs`); everything here is
//! construction and read access.

use crate::field::FieldId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const UNASSIGNED: &str = "unassigned";
pub const UNASSIGNED_ALIASES: [&str; 2] = [UNASSIGNED, "unmappedFields"];

pub const USERNAME_ROLE: &str = "usernameMappings";
pub const PASSWORD_ROLE: &str = "passwordMappings";
pub const NEW_PASSWORD_ROLE: &str = "newPasswordMappings";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: RoleName,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl RoleSpec {
    pub fn required(name: &str) -> Self {
        Self {
            name: RoleName::new(name),
            required: true,
        }
    }
}

pub fn default_roles() -> Vec<RoleSpec> {
    vec![
        RoleSpec::required(USERNAME_ROLE),
        RoleSpec::required(PASSWORD_ROLE),
        RoleSpec::required(NEW_PASSWORD_ROLE),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketId {
    Unassigned,
    Role(RoleName),
}

impl BucketId {
    /// `unassigned` and `unmappedFields` name the unassigned bucket; any other
    /// name is taken as a role. Whether the role exists is checked by the
    /// partition.
    pub fn parse(name: &str) -> Self {
        if UNASSIGNED_ALIASES.contains(&name) {
            Self::Unassigned
        } else {
            Self::Role(RoleName::new(name))
        }
    }

    pub fn role(name: &str) -> Self {
        Self::Role(RoleName::new(name))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unassigned => UNASSIGNED,
            Self::Role(role) => role.as_str(),
        }
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    roles: Vec<RoleSpec>,
    universe: Vec<FieldId>,
    unassigned: Vec<FieldId>,
    assigned: Vec<Vec<FieldId>>,
}

impl Partition {
    /// All `fields` start unassigned, in the given order. Repeated fields are
    /// collapsed onto their first occurrence.
    pub fn new(fields: Vec<FieldId>, roles: &[RoleSpec]) -> Self {
        let mut seen = HashSet::new();
        let universe = fields
            .into_iter()
            .filter(|field| seen.insert(field.clone()))
            .collect::<Vec<_>>();
        Self {
            roles: roles.to_vec(),
            unassigned: universe.clone(),
            universe,
            assigned: vec![Vec::new(); roles.len()],
        }
    }

    pub fn roles(&self) -> &[RoleSpec] {
        &self.roles
    }

    /// Every field in the partition, in extraction order.
    pub fn fields(&self) -> &[FieldId] {
        &self.universe
    }

    pub fn len(&self) -> usize {
        self.universe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universe.is_empty()
    }

    pub fn contains_field(&self, field: &FieldId) -> bool {
        self.universe.contains(field)
    }

    pub fn unassigned(&self) -> &[FieldId] {
        &self.unassigned
    }

    pub fn role_index(&self, role: &RoleName) -> Option<usize> {
        self.roles.iter().position(|spec| &spec.name == role)
    }

    pub fn bucket(&self, bucket: &BucketId) -> Option<&[FieldId]> {
        match bucket {
            BucketId::Unassigned => Some(&self.unassigned),
            BucketId::Role(role) => self
                .role_index(role)
                .and_then(|index| self.assigned.get(index))
                .map(Vec::as_slice),
        }
    }

    pub(crate) fn bucket_mut(&mut self, bucket: &BucketId) -> Option<&mut Vec<FieldId>> {
        match bucket {
            BucketId::Unassigned => Some(&mut self.unassigned),
            BucketId::Role(role) => {
                let index = self.role_index(role)?;
                self.assigned.get_mut(index)
            }
        }
    }

    /// Bucket currently holding `field`, if it belongs to the partition.
    pub fn is_assigned(&self, field: &FieldId) -> Option<BucketId> {
        if self.unassigned.contains(field) {
            return Some(BucketId::Unassigned);
        }
        self.roles
            .iter()
            .zip(&self.assigned)
            .find(|(_, fields)| fields.contains(field))
            .map(|(spec, _)| BucketId::Role(spec.name.clone()))
    }

    /// Position of `field` as `(bucket, index)`.
    pub fn locate(&self, field: &FieldId) -> Option<(BucketId, usize)> {
        let bucket = self.is_assigned(field)?;
        let index = self.bucket(&bucket)?.iter().position(|f| f == field)?;
        Some((bucket, index))
    }

    /// The entry used when the role is resolved to a recorded value.
    pub fn first_in(&self, role: &RoleName) -> Option<&FieldId> {
        self.bucket(&BucketId::Role(role.clone()))
            .and_then(<[FieldId]>::first)
    }

    pub fn buckets_view(&self) -> BucketsView {
        let mut buckets = Vec::with_capacity(self.roles.len() + 1);
        buckets.push(BucketSnapshot {
            id: BucketId::Unassigned,
            required: false,
            fields: self.unassigned.clone(),
        });
        for (spec, fields) in self.roles.iter().zip(&self.assigned) {
            buckets.push(BucketSnapshot {
                id: BucketId::Role(spec.name.clone()),
                required: spec.required,
                fields: fields.clone(),
            });
        }
        BucketsView { buckets }
    }

    /// True when every field of the universe sits in exactly one bucket once.
    pub fn check_invariant(&self) -> bool {
        let mut seen = HashSet::new();
        let all = self.unassigned.iter().chain(self.assigned.iter().flatten());
        for field in all {
            if !self.universe.contains(field) || !seen.insert(field) {
                return false;
            }
        }
        seen.len() == self.universe.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub id: BucketId,
    pub required: bool,
    pub fields: Vec<FieldId>,
}

/// Owned read-only snapshot of every bucket: unassigned first, then roles in
/// configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketsView {
    pub buckets: Vec<BucketSnapshot>,
}

impl BucketsView {
    pub fn bucket(&self, id: &BucketId) -> Option<&BucketSnapshot> {
        self.buckets.iter().find(|bucket| &bucket.id == id)
    }

    pub fn total_fields(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.fields.len()).sum()
    }
}
