//! Debug line accumulation
//!
//! Compilation passes can optionally emit coloured line segments showing
//! what they did (rewritten linestrips, intersection markers, ...). The
//! sink is threaded through the relevant calls as `Option<&mut DebugLines>`
//! so nothing global is touched; callers that do not care pass `None`.

use serde::{Deserialize, Serialize};

use crate::geometry::{Linestrip, Vec3, Vertex};

/// A single coloured debug segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebugSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub colour: Vec3,
}

/// Accumulator for debug segments emitted during compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugLines {
    pub segments: Vec<DebugSegment>,
}

impl DebugLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_segment(&mut self, colour: Vec3, start: Vec3, end: Vec3) {
        self.segments.push(DebugSegment { start, end, colour });
    }

    /// Appends one segment per edge of a linestrip.
    pub fn push_linestrip(&mut self, colour: Vec3, coordinates: &[Vertex], linestrip: &Linestrip) {
        for w in linestrip.indices.windows(2) {
            let start = coordinates[w[0] as usize].position;
            let end = coordinates[w[1] as usize].position;
            self.push_segment(colour, start, end);
        }
    }

    /// Appends a circle outline around a point.
    pub fn push_circle(&mut self, colour: Vec3, center: Vec3, radius: f32, segments: u32) {
        let step = std::f32::consts::TAU / segments.max(3) as f32;
        let point_at = |i: u32| {
            let angle = step * i as f32;
            center + Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
        };
        for i in 0..segments.max(3) {
            self.push_segment(colour, point_at(i), point_at(i + 1));
        }
    }
}
