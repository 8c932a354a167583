//! Bucketed layer containers
//!
//! A bucketized layer splits a compiled map layer into spatially bounded
//! vertex subsets (buckets) and recursively subdivided index sets
//! referencing them, so the renderer can cull on two levels: whole
//! buckets against the view frustum, then individual index sets.

use serde::{Deserialize, Serialize};

use super::bounds::BoundingBox2D;
use super::compact::CompactTriangle;
use super::types::{QuadVertex, Vertex};

/// Triangle-based primitives of one bucket index set, indexed with
/// bucket-local 16-bit indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderIndexSet {
    pub triangles: Vec<CompactTriangle>,
    pub quad_triangles: Vec<CompactTriangle>,
}

impl RenderIndexSet {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.quad_triangles.is_empty()
    }

    pub fn primitive_count(&self) -> usize {
        self.triangles.len() + self.quad_triangles.len()
    }
}

/// A spatially bounded, deduplicated subset of a layer's vertices.
/// A bucket holds either triangle vertices or label quad vertices,
/// never both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinateBucket {
    pub bounding_box: BoundingBox2D,
    pub coordinates: Vec<Vertex>,
    pub quad_vertices: Vec<QuadVertex>,
}

/// An index set defined within one coordinate bucket. The bounding box
/// describes the extents of the contained primitives; `bucket` refers
/// into the layer's coordinate bucket list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketIndexSet {
    pub bucket: u32,
    pub bounding_box: BoundingBox2D,
    pub index_set: RenderIndexSet,
}

/// A map layer split into buckets. The bounding box spans the whole
/// layer; each bucket index set references the coordinate bucket it
/// draws from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketMapLayer {
    pub bounding_box: BoundingBox2D,
    pub coordinate_buckets: Vec<CoordinateBucket>,
    pub bucket_index_sets: Vec<BucketIndexSet>,
}
