//! Tessellation of map geometry into triangle meshes
//!
//! This module converts the 2D source geometry of a map layer (polygons
//! and road linestrips) into triangle meshes for GPU rendering.
//!
//! # Submodules
//! - `polygon` - Ear-clipping polygon triangulation
//! - `topology` - Road network intersection extraction and duplicate removal
//! - `ribbon` - Linestrip extrusion into textured ribbons with miter joins
//! - `junction` - Junction resolution (weld / snap / clip / fan) and dead-end caps

mod junction;
mod polygon;
mod ribbon;
mod topology;

pub use polygon::{
    polygon_area,
    triangulate_multipolygon,
    triangulate_polygon,
};

pub use topology::{
    extract_intersections,
    remove_duplicate_linestrips,
    Intersection,
    Topology,
    UnionFind,
};

pub use ribbon::{
    contract_short_linestrips,
    convert_linestrips,
    triangulate_linestrip,
    Ribbon,
    RibbonParams,
    RibbonStats,
};

pub use junction::{
    triangulate_cap,
    triangulate_junction,
    JunctionPatch,
};
