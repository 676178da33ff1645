use crate::field::FieldId;
use crate::partition::{BucketId, Partition, RoleName};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    /// Every field must leave the unassigned bucket before generation.
    pub require_unassigned_empty: bool,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            require_unassigned_empty: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub unassigned_remaining: usize,
    pub unassigned_blocks: bool,
    pub empty_required_roles: Vec<RoleName>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        !(self.unassigned_blocks && self.unassigned_remaining > 0)
            && self.empty_required_roles.is_empty()
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ready() {
            return f.write_str("ready");
        }
        let mut reasons = Vec::new();
        if self.unassigned_blocks && self.unassigned_remaining > 0 {
            reasons.push(format!("{} unassigned field(s)", self.unassigned_remaining));
        }
        if !self.empty_required_roles.is_empty() {
            let names = self
                .empty_required_roles
                .iter()
                .map(RoleName::as_str)
                .collect::<Vec<_>>();
            reasons.push(format!("empty required roles: {}", names.join(", ")));
        }
        f.write_str(&reasons.join("; "))
    }
}

pub fn check(partition: &Partition, policy: &ReadinessPolicy) -> Readiness {
    let empty_required_roles = partition
        .roles()
        .iter()
        .filter(|spec| spec.required)
        .filter(|spec| {
            partition
                .bucket(&BucketId::Role(spec.name.clone()))
                .map_or(true, <[FieldId]>::is_empty)
        })
        .map(|spec| spec.name.clone())
        .collect();

    Readiness {
        unassigned_remaining: partition.unassigned().len(),
        unassigned_blocks: policy.require_unassigned_empty,
        empty_required_roles,
    }
}

/// Recomputed on every call; callers query it after each change.
pub fn is_ready(partition: &Partition, policy: &ReadinessPolicy) -> bool {
    check(partition, policy).is_ready()
}
