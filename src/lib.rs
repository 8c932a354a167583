//! Offline geospatial-to-mesh compiler
//!
//! Turns vector map data (road linestrips, area polygons, label quads)
//! into renderable, spatially partitioned triangle geometry for a
//! real-time map renderer. The pipeline:
//!
//! 1. Polygons are triangulated by ear clipping ([`tessellation`]).
//! 2. Road linestrips are grouped into an intersection topology,
//!    de-duplicated, contracted where shorter than the road width, and
//!    extruded into textured ribbons with miter joins; junctions and
//!    dead ends are resolved into watertight geometry.
//! 3. The compiled layer is split into culling-friendly coordinate
//!    buckets with 16-bit local indices and recursively subdivided index
//!    sets ([`bucketing`]).
//! 4. Layers travel in a little-endian binary format with per-section
//!    checkpoints ([`binary`]).
//!
//! The [`layer`] module ties the steps together behind a list of
//! [`layer::LayerOperation`]s per layer. Importers (OGR/OSM and friends)
//! and the texture atlas/sign pipeline live outside this crate; it
//! consumes and produces [`geometry::MapLayer`] values.

pub mod binary;
pub mod bucketing;
pub mod debug;
pub mod geometry;
pub mod layer;
pub mod tessellation;

pub use bucketing::bucketize_layer;
pub use debug::{DebugLines, DebugSegment};
pub use layer::{compile_layer, CompileStats, LayerOperation};
pub use tessellation::{RibbonParams, RibbonStats};
