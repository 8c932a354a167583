//! Axis-aligned 2D bounding boxes
//!
//! The bucketizer leans on these for all of its spatial tests: point
//! containment, box overlap and recursive quad subdivision.

use serde::{Deserialize, Serialize};

use super::types::{Vec2, Vec3};

/// A 2D axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
    pub min: Vec2,
    pub max: Vec2,
}

impl BoundingBox2D {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        BoundingBox2D { min, max }
    }

    /// Degenerate box spanning a single point.
    pub fn from_point(p: Vec2) -> Self {
        BoundingBox2D { min: p, max: p }
    }

    pub fn width(&self) -> f32 {
        (self.max.x - self.min.x).abs()
    }

    pub fn height(&self) -> f32 {
        (self.max.y - self.min.y).abs()
    }

    pub fn dimensions(&self) -> Vec2 {
        Vec2::new(self.width(), self.height())
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Inclusive point containment.
    pub fn contains(&self, v: Vec2) -> bool {
        v.x >= self.min.x && v.y >= self.min.y && v.x <= self.max.x && v.y <= self.max.y
    }

    /// Containment of a 3D point's XY projection.
    pub fn contains_xy(&self, v: Vec3) -> bool {
        self.contains(v.xy())
    }

    pub fn overlaps(&self, other: &BoundingBox2D) -> bool {
        !(other.min.x > self.max.x
            || other.min.y > self.max.y
            || other.max.x < self.min.x
            || other.max.y < self.min.y)
    }

    /// Grows the box to include the XY projection of a point.
    pub fn extend(&mut self, v: Vec3) {
        self.min.x = self.min.x.min(v.x);
        self.min.y = self.min.y.min(v.y);
        self.max.x = self.max.x.max(v.x);
        self.max.y = self.max.y.max(v.y);
    }

    /// Grows the box to include another box.
    pub fn merge(&mut self, other: &BoundingBox2D) {
        self.min.x = self.min.x.min(other.min.x);
        self.min.y = self.min.y.min(other.min.y);
        self.max.x = self.max.x.max(other.max.x);
        self.max.y = self.max.y.max(other.max.y);
    }

    /// Splits the box into four equally sized quadrants.
    pub fn subdivide(&self) -> [BoundingBox2D; 4] {
        let middle = self.center();
        [
            // upper left
            BoundingBox2D::new(Vec2::new(self.min.x, middle.y), Vec2::new(middle.x, self.max.y)),
            // lower left
            BoundingBox2D::new(self.min, middle),
            // lower right
            BoundingBox2D::new(Vec2::new(middle.x, self.min.y), Vec2::new(self.max.x, middle.y)),
            // upper right
            BoundingBox2D::new(middle, self.max),
        ]
    }
}
