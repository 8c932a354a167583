//! Core geometry types for navigation map layers
//!
//! This module contains the fundamental primitives used throughout the
//! compiler: vectors, vertices, triangles, linestrips, polygons, label
//! quads and the layer containers that tie them together.

use serde::{Deserialize, Serialize};

/// A 2D vector / point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, s: f32) -> Vec2 {
        Vec2::new(self.x * s, self.y * s)
    }
}

/// A 3D vector / point. The compiler works in the XY plane; z is carried
/// through untouched so elevated geometry survives compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }

    pub fn xy(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn dot(self, rhs: Vec3) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    /// Returns the normalized vector, or the vector unchanged if its
    /// length is zero.
    pub fn normalized(self) -> Vec3 {
        let len_sq = self.length_sq();
        if len_sq > 0.0 {
            self * (1.0 / len_sq.sqrt())
        } else {
            self
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

/// A 3x3 matrix used to transform texture coordinates. Stored row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat3 {
    pub m: [[f32; 3]; 3],
}

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3 {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Transforms a 2D point treated as the homogeneous vector (x, y, 1),
    /// dropping the resulting third component.
    pub fn transform_uv(&self, u: f32, v: f32) -> Vec2 {
        Vec2::new(
            self.m[0][0] * u + self.m[0][1] * v + self.m[0][2],
            self.m[1][0] * u + self.m[1][1] * v + self.m[1][2],
        )
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Mat3::IDENTITY
    }
}

/// A renderable vertex: 3D position plus texture coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Vec3,
    pub texcoord: Vec2,
}

/// Indices of a single triangle into a vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl Triangle {
    pub const fn new(a: u32, b: u32, c: u32) -> Self {
        Triangle { a, b, c }
    }
}

/// Topology endpoint identifier value meaning "not part of the road
/// network" (e.g. unclassified segments).
pub const NO_TOPOLOGY_ID: i32 = -1;

/// An ordered polyline over shared vertices, tagged with the topology
/// identifiers of its two endpoints and a functional road class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Linestrip {
    pub start_id: i32,
    pub end_id: i32,
    pub func_class: i32,
    pub indices: Vec<u32>,
}

impl Linestrip {
    /// Total length of the polyline in the XY plane.
    pub fn length(&self, coordinates: &[Vertex]) -> f32 {
        self.indices
            .windows(2)
            .map(|w| {
                let a = coordinates[w[0] as usize].position;
                let b = coordinates[w[1] as usize].position;
                (b - a).length()
            })
            .sum()
    }
}

/// A single closed ring of vertex indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    pub indices: Vec<u32>,
}

/// An outer ring plus inner rings. Inner rings are carried for
/// completeness but triangulation only uses the outer ring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiPolygon {
    pub polygons: Vec<Polygon>,
}

/// A vertex of a screen-space aligned label quad. The anchor `origin` is
/// the pivot the renderer expands the quad around; `word_index` and
/// `height_index` place the glyph within its word, `u`/`v` address the
/// glyph atlas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuadVertex {
    pub origin: Vec2,
    pub word_index: i8,
    pub height_index: i8,
    pub u: u8,
    pub v: u8,
}

/// A named point of interest, produced by the importer and consumed by
/// the sign converter (external, see the crate docs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sign {
    pub position: Vec2,
    pub name: String,
}

/// A street name attached to a linestrip by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub linestrip: u32,
    pub name: String,
}

/// Container for every kind of index-based primitive a layer can hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSet {
    pub linestrips: Vec<Linestrip>,
    pub polygons: Vec<Polygon>,
    pub multipolygons: Vec<MultiPolygon>,
    pub triangles: Vec<Triangle>,
    pub points: Vec<u32>,
    pub signs: Vec<Sign>,
    pub texts: Vec<Text>,
    pub quad_triangles: Vec<Triangle>,
}

impl IndexSet {
    pub fn is_empty(&self) -> bool {
        self.linestrips.is_empty()
            && self.polygons.is_empty()
            && self.triangles.is_empty()
            && self.points.is_empty()
            && self.quad_triangles.is_empty()
            && self.texts.is_empty()
    }

    pub fn primitive_count(&self) -> usize {
        self.linestrips.len()
            + self.polygons.len()
            + self.triangles.len()
            + self.points.len()
            + self.quad_triangles.len()
            + self.texts.len()
    }
}

/// A navigation map layer: bounding box, the vertex array shared by all
/// primitives, the label quad vertices and the index set. Produced by an
/// importer or deserialized from the binary layer format; compilation
/// replaces its contents in place per operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapLayer {
    pub bounding_box: super::BoundingBox2D,
    pub coordinates: Vec<Vertex>,
    pub quad_vertices: Vec<QuadVertex>,
    pub index_set: IndexSet,
}
