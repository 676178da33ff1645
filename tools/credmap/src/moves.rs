use crate::errors::MoveError;
use crate::field::FieldId;
use crate::partition::{BucketId, Partition};

/// Relocate `field` from `from[from_index]` to `to[to_index]`. The same
/// request shape covers reordering within one bucket and reassignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub field: FieldId,
    pub from: BucketId,
    pub from_index: usize,
    pub to: BucketId,
    pub to_index: usize,
}

impl MoveRequest {
    /// Builds a request for whatever field currently sits at `from[from_index]`.
    pub fn at(
        partition: &Partition,
        from: BucketId,
        from_index: usize,
        to: BucketId,
        to_index: usize,
    ) -> Result<Self, MoveError> {
        let source = partition
            .bucket(&from)
            .ok_or_else(|| MoveError::UnknownBucket(from.to_string()))?;
        let field = source
            .get(from_index)
            .cloned()
            .ok_or_else(|| MoveError::InvalidIndex {
                bucket: from.to_string(),
                index: from_index,
                len: source.len(),
            })?;
        Ok(Self {
            field,
            from,
            from_index,
            to,
            to_index,
        })
    }

    /// Moves `field` from wherever it is to the end of `to`.
    pub fn append(partition: &Partition, field: &FieldId, to: BucketId) -> Result<Self, MoveError> {
        let (from, from_index) = partition
            .locate(field)
            .ok_or_else(|| MoveError::UnknownField {
                field: field.to_string(),
                bucket: to.to_string(),
                index: 0,
            })?;
        let dest_len = partition
            .bucket(&to)
            .ok_or_else(|| MoveError::UnknownBucket(to.to_string()))?
            .len();
        let to_index = if from == to { dest_len - 1 } else { dest_len };
        Ok(Self {
            field: field.clone(),
            from,
            from_index,
            to,
            to_index,
        })
    }
}

impl Partition {
    /// Validates every precondition first and only then builds the next
    /// partition, so a rejected request never touches `self`.
    pub fn apply_move(&self, request: &MoveRequest) -> Result<Partition, MoveError> {
        let source = self
            .bucket(&request.from)
            .ok_or_else(|| MoveError::UnknownBucket(request.from.to_string()))?;
        let dest_len = self
            .bucket(&request.to)
            .ok_or_else(|| MoveError::UnknownBucket(request.to.to_string()))?
            .len();

        let not_at_source = || MoveError::UnknownField {
            field: request.field.to_string(),
            bucket: request.from.to_string(),
            index: request.from_index,
        };
        if !self.contains_field(&request.field) {
            return Err(not_at_source());
        }
        let current = source
            .get(request.from_index)
            .ok_or_else(|| MoveError::InvalidIndex {
                bucket: request.from.to_string(),
                index: request.from_index,
                len: source.len(),
            })?;
        if current != &request.field {
            return Err(not_at_source());
        }

        let dest_len = if request.from == request.to {
            dest_len - 1
        } else {
            dest_len
        };
        if request.to_index > dest_len {
            return Err(MoveError::InvalidIndex {
                bucket: request.to.to_string(),
                index: request.to_index,
                len: dest_len,
            });
        }

        let mut next = self.clone();
        let removed = next
            .bucket_mut(&request.from)
            .map(|bucket| bucket.remove(request.from_index))
            .ok_or_else(|| MoveError::UnknownBucket(request.from.to_string()))?;
        next.bucket_mut(&request.to)
            .ok_or_else(|| MoveError::UnknownBucket(request.to.to_string()))?
            .insert(request.to_index, removed);
        debug_assert!(next.check_invariant());
        Ok(next)
    }

    /// In-place form of [`Partition::apply_move`].
    pub fn move_field(&mut self, request: &MoveRequest) -> Result<(), MoveError> {
        *self = self.apply_move(request)?;
        Ok(())
    }
}
