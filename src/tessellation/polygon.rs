//! Ear-clipping polygon triangulation
//!
//! Triangulates simple, non-self-intersecting rings by iteratively
//! clipping convex vertices ("ears") with no other ring vertex inside
//! the candidate triangle. Rings are normalized to counter-clockwise
//! winding via their signed area before clipping. Degenerate or
//! self-intersecting rings make the routine fail instead of looping;
//! callers skip the offending polygon and continue their batch.

use anyhow::{bail, Result};

use crate::geometry::{MultiPolygon, Polygon, Triangle, Vec3, Vertex};

/// Convexity epsilon for the ear test.
const EAR_EPSILON: f32 = 1e-10;

/// Signed area of a ring in the XY plane. Positive for counter-clockwise
/// winding, negative for clockwise; correct in absolute value either way.
pub fn polygon_area(coordinates: &[Vertex], polygon: &Polygon) -> f32 {
    let n = polygon.indices.len();
    let mut area = 0.0;
    for q in 0..n {
        let p = (q + n - 1) % n;
        let pp = coordinates[polygon.indices[p] as usize].position;
        let pq = coordinates[polygon.indices[q] as usize].position;
        area += pp.x * pq.y - pp.y * pq.x;
    }
    area * 0.5
}

/// Inclusive point-in-triangle test via barycentric sign agreement.
fn point_in_triangle(a: Vec3, b: Vec3, c: Vec3, p: Vec3) -> bool {
    let sa = (c.x - b.x) * (p.y - b.y) - (c.y - b.y) * (p.x - b.x);
    let sb = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    let sc = (a.x - c.x) * (p.y - c.y) - (a.y - c.y) * (p.x - c.x);
    sa >= 0.0 && sb >= 0.0 && sc >= 0.0
}

/// Tests whether the ring triple (u, v, w) forms an ear: the corner must
/// be convex and no remaining ring vertex may lie inside the triangle.
fn is_ear(coordinates: &[Vertex], u: usize, v: usize, w: usize, ring: &[u32]) -> bool {
    let a = coordinates[ring[u] as usize].position;
    let b = coordinates[ring[v] as usize].position;
    let c = coordinates[ring[w] as usize].position;

    if (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x) < EAR_EPSILON {
        return false;
    }

    for p in 0..ring.len() {
        if p == u || p == v || p == w {
            continue;
        }
        if point_in_triangle(a, b, c, coordinates[ring[p] as usize].position) {
            return false;
        }
    }

    true
}

/// Triangulates a simple, non-self-intersecting polygon, appending the
/// resulting triangles (indexing into `coordinates`) to `triangles`.
///
/// Fails for rings with fewer than 3 indices and for rings on which ear
/// clipping makes no progress within two full scans, which indicates a
/// degenerate or self-intersecting ring.
pub fn triangulate_polygon(
    coordinates: &[Vertex],
    polygon: &Polygon,
    triangles: &mut Vec<Triangle>,
) -> Result<()> {
    let num_vertices = polygon.indices.len();
    if num_vertices < 3 {
        bail!("polygon has fewer than 3 vertices");
    }

    // The ring must be counter-clockwise; reverse the index order if the
    // signed area says otherwise.
    let mut ring: Vec<u32> = if polygon_area(coordinates, polygon) > 0.0 {
        polygon.indices.clone()
    } else {
        polygon.indices.iter().rev().copied().collect()
    };

    // Clipping an ear makes progress; a full scan without one means the
    // ring is degenerate. The counter is reset after every clipped ear.
    let mut loop_counter = ring.len() * 2;

    let mut v = ring.len() - 1;
    while ring.len() > 2 {
        if loop_counter == 0 {
            bail!("no ear found, ring is degenerate or self-intersecting");
        }
        loop_counter -= 1;

        let n = ring.len();
        let u = v % n;
        v = (u + 1) % n;
        let w = (v + 1) % n;

        if is_ear(coordinates, u, v, w, &ring) {
            triangles.push(Triangle::new(ring[u], ring[v], ring[w]));
            ring.remove(v);
            loop_counter = ring.len() * 2;
        }
    }

    Ok(())
}

/// Triangulates the exterior ring of a multi-ring shape. Inner rings are
/// not triangulated; see the module docs for the hole handling caveat.
pub fn triangulate_multipolygon(
    coordinates: &[Vertex],
    multipolygon: &MultiPolygon,
    triangles: &mut Vec<Triangle>,
) -> Result<()> {
    let Some(outer) = multipolygon.polygons.first() else {
        bail!("multipolygon has no rings");
    };
    triangulate_polygon(coordinates, outer, triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;

    fn vertex(x: f32, y: f32) -> Vertex {
        Vertex {
            position: Vec3::new(x, y, 0.0),
            texcoord: Vec2::default(),
        }
    }

    fn ring(points: &[(f32, f32)]) -> (Vec<Vertex>, Polygon) {
        let coordinates: Vec<Vertex> = points.iter().map(|&(x, y)| vertex(x, y)).collect();
        let polygon = Polygon {
            indices: (0..points.len() as u32).collect(),
        };
        (coordinates, polygon)
    }

    fn triangle_area(coordinates: &[Vertex], t: &Triangle) -> f32 {
        let a = coordinates[t.a as usize].position;
        let b = coordinates[t.b as usize].position;
        let c = coordinates[t.c as usize].position;
        0.5 * ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs()
    }

    fn total_area(coordinates: &[Vertex], triangles: &[Triangle]) -> f32 {
        triangles.iter().map(|t| triangle_area(coordinates, t)).sum()
    }

    #[test]
    fn test_square_two_triangles() {
        let (coordinates, polygon) = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        let mut triangles = Vec::new();
        triangulate_polygon(&coordinates, &polygon, &mut triangles).unwrap();
        assert_eq!(triangles.len(), 2);
        assert!((total_area(&coordinates, &triangles) - 16.0).abs() < 1e-4);
    }

    #[test]
    fn test_triangle_count_is_n_minus_2() {
        // Concave L-shape with 6 vertices
        let (coordinates, polygon) = ring(&[
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ]);
        let mut triangles = Vec::new();
        triangulate_polygon(&coordinates, &polygon, &mut triangles).unwrap();
        assert_eq!(triangles.len(), polygon.indices.len() - 2);
        assert!((total_area(&coordinates, &triangles) - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_reversed_winding_same_area() {
        let points = [(0.0, 0.0), (3.0, 0.0), (3.0, 2.0), (1.5, 3.0), (0.0, 2.0)];
        let (coordinates, polygon) = ring(&points);
        let reversed = Polygon {
            indices: polygon.indices.iter().rev().copied().collect(),
        };

        let mut forward = Vec::new();
        let mut backward = Vec::new();
        triangulate_polygon(&coordinates, &polygon, &mut forward).unwrap();
        triangulate_polygon(&coordinates, &reversed, &mut backward).unwrap();

        assert_eq!(forward.len(), backward.len());
        let area_fwd = total_area(&coordinates, &forward);
        let area_bwd = total_area(&coordinates, &backward);
        assert!((area_fwd - area_bwd).abs() < 1e-4);

        // Same vertex set in both triangulations
        let mut used_fwd: Vec<u32> = forward.iter().flat_map(|t| [t.a, t.b, t.c]).collect();
        let mut used_bwd: Vec<u32> = backward.iter().flat_map(|t| [t.a, t.b, t.c]).collect();
        used_fwd.sort_unstable();
        used_fwd.dedup();
        used_bwd.sort_unstable();
        used_bwd.dedup();
        assert_eq!(used_fwd, used_bwd);
    }

    #[test]
    fn test_too_few_vertices_fails() {
        let (coordinates, _) = ring(&[(0.0, 0.0), (1.0, 0.0)]);
        let polygon = Polygon { indices: vec![0, 1] };
        let mut triangles = Vec::new();
        assert!(triangulate_polygon(&coordinates, &polygon, &mut triangles).is_err());
    }

    #[test]
    fn test_degenerate_ring_fails_instead_of_looping() {
        // All points collinear: no ear can ever be clipped
        let (coordinates, polygon) = ring(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        let mut triangles = Vec::new();
        assert!(triangulate_polygon(&coordinates, &polygon, &mut triangles).is_err());
    }

    #[test]
    fn test_multipolygon_uses_outer_ring_only() {
        let (mut coordinates, outer) = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]);
        // Inner ring (hole) which must be ignored
        let base = coordinates.len() as u32;
        coordinates.extend([vertex(1.0, 1.0), vertex(2.0, 1.0), vertex(2.0, 2.0)]);
        let multipolygon = MultiPolygon {
            polygons: vec![
                outer,
                Polygon {
                    indices: vec![base, base + 1, base + 2],
                },
            ],
        };
        let mut triangles = Vec::new();
        triangulate_multipolygon(&coordinates, &multipolygon, &mut triangles).unwrap();
        assert_eq!(triangles.len(), 2);
        assert!(triangles.iter().all(|t| t.a < base && t.b < base && t.c < base));
    }

    #[test]
    fn test_empty_multipolygon_fails() {
        let multipolygon = MultiPolygon::default();
        let mut triangles = Vec::new();
        assert!(triangulate_multipolygon(&[], &multipolygon, &mut triangles).is_err());
    }

    #[test]
    fn test_matches_earcut_area_on_simple_ring() {
        let points = [
            (0.0f32, 0.0f32),
            (4.0, 0.0),
            (5.0, 2.0),
            (4.0, 4.0),
            (2.0, 5.0),
            (0.0, 4.0),
            (-1.0, 2.0),
        ];
        let (coordinates, polygon) = ring(&points);
        let mut triangles = Vec::new();
        triangulate_polygon(&coordinates, &polygon, &mut triangles).unwrap();

        let flat: Vec<f64> = points.iter().flat_map(|&(x, y)| [x as f64, y as f64]).collect();
        let earcut_indices = earcutr::earcut(&flat, &[], 2).unwrap();
        assert_eq!(triangles.len() * 3, earcut_indices.len());

        let earcut_area: f64 = earcut_indices
            .chunks(3)
            .map(|t| {
                let (ax, ay) = (flat[t[0] * 2], flat[t[0] * 2 + 1]);
                let (bx, by) = (flat[t[1] * 2], flat[t[1] * 2 + 1]);
                let (cx, cy) = (flat[t[2] * 2], flat[t[2] * 2 + 1]);
                0.5 * ((bx - ax) * (cy - ay) - (by - ay) * (cx - ax)).abs()
            })
            .sum();
        assert!((total_area(&coordinates, &triangles) as f64 - earcut_area).abs() < 1e-3);
    }
}
