//! 16-bit bucket-local indices
//!
//! Bucket vertex subsets must be addressable with 16-bit indices so the
//! renderer can upload them as `u16` index buffers. The constructor is
//! checked: a bucket that was mis-sized upstream fails fast instead of
//! silently truncating indices.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A bucket-local vertex index guaranteed to fit in 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompactIndex(u16);

impl CompactIndex {
    /// Largest representable index.
    pub const MAX: usize = u16::MAX as usize;

    pub fn new(index: usize) -> Result<Self> {
        if index > Self::MAX {
            bail!("index {} exceeds the 16-bit bucket index limit", index);
        }
        Ok(CompactIndex(index as u16))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}

/// A triangle over bucket-local compact indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactTriangle {
    pub a: CompactIndex,
    pub b: CompactIndex,
    pub c: CompactIndex,
}

impl CompactTriangle {
    pub fn new(a: usize, b: usize, c: usize) -> Result<Self> {
        Ok(CompactTriangle {
            a: CompactIndex::new(a)?,
            b: CompactIndex::new(b)?,
            c: CompactIndex::new(c)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_index_bounds() {
        assert!(CompactIndex::new(0).is_ok());
        assert!(CompactIndex::new(CompactIndex::MAX).is_ok());
        assert!(CompactIndex::new(CompactIndex::MAX + 1).is_err());
    }

    #[test]
    fn test_compact_triangle_checks_all_corners() {
        assert!(CompactTriangle::new(0, 1, 2).is_ok());
        assert!(CompactTriangle::new(0, 70_000, 2).is_err());
    }
}
