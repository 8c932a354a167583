//! Geometry module for navigation map data
//!
//! This module provides all geometric types used for representing map
//! layers before and after compilation.
//!
//! # Submodules
//! - `types` - Core primitives (vectors, vertices, linestrips, polygons, layers)
//! - `bounds` - 2D axis-aligned bounding boxes
//! - `compact` - Checked 16-bit bucket-local indices
//! - `buckets` - Bucketed layer containers

mod bounds;
mod buckets;
mod compact;
mod types;

pub use types::{
    IndexSet, Linestrip, MapLayer, Mat3, MultiPolygon, Polygon, QuadVertex, Sign, Text, Triangle,
    Vec2, Vec3, Vertex, NO_TOPOLOGY_ID,
};

pub use bounds::BoundingBox2D;

pub use compact::{CompactIndex, CompactTriangle};

pub use buckets::{BucketIndexSet, BucketMapLayer, CoordinateBucket, RenderIndexSet};
