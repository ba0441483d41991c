//! Balanced contiguous partitioning.
//!
//! A sequence of `n` items split into `p` partitions gives the first `n % p`
//! partitions `n / p + 1` items and the rest `n / p`. Concatenating the
//! partitions in order always reproduces the input. When `n < p` the
//! trailing partitions are empty but still present.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{EngineError, Result};

/// Index ranges of `count` balanced contiguous partitions over `len` items.
pub fn partition_bounds(len: usize, count: usize) -> Result<Vec<Range<usize>>> {
    if count == 0 {
        return Err(EngineError::InvalidPartitionCount {
            count,
            workers: None,
        });
    }

    let base = len / count;
    let larger = len % count;
    let mut bounds = Vec::with_capacity(count);
    let mut start = 0;
    for index in 0..count {
        let size = if index < larger { base + 1 } else { base };
        bounds.push(start..start + size);
        start += size;
    }
    debug_assert_eq!(start, len);
    Ok(bounds)
}

/// Split a borrowed slice into `count` partitions, cloning the items.
pub fn partition<T: Clone>(items: &[T], count: usize) -> Result<Vec<Vec<T>>> {
    Ok(partition_bounds(items.len(), count)?
        .into_iter()
        .map(|range| items[range].to_vec())
        .collect())
}

/// Split an owned vector into `count` partitions without cloning.
pub fn partition_owned<T>(items: Vec<T>, count: usize) -> Result<Vec<Vec<T>>> {
    let bounds = partition_bounds(items.len(), count)?;
    let mut rest = items.into_iter();
    Ok(bounds
        .into_iter()
        .map(|range| rest.by_ref().take(range.len()).collect())
        .collect())
}

/// A read-only view of one partition of a shared input.
///
/// Workers receive views rather than copies; the shared input is never
/// mutated.
#[derive(Debug)]
pub struct Partition<T> {
    index: usize,
    source: Arc<[T]>,
    range: Range<usize>,
}

impl<T> Clone for Partition<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            source: Arc::clone(&self.source),
            range: self.range.clone(),
        }
    }
}

impl<T> Partition<T> {
    /// Position of this partition among its siblings.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset of this partition's first item within the full input.
    pub fn offset(&self) -> usize {
        self.range.start
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.source[self.range.clone()]
    }
}

/// Split a shared input into `count` partition views.
pub fn partition_shared<T>(source: &Arc<[T]>, count: usize) -> Result<Vec<Partition<T>>> {
    Ok(partition_bounds(source.len(), count)?
        .into_iter()
        .enumerate()
        .map(|(index, range)| Partition {
            index,
            source: Arc::clone(source),
            range,
        })
        .collect())
}
