//! Linestrip ribbon triangulation
//!
//! Extrudes every linestrip of a road network into a textured triangle
//! ribbon of a given width. Interior joints get a true miter join: the
//! shared rail vertices are recast from the original point and scaled by
//! the inverse cosine of the bend angle so sharp turns do not narrow the
//! road. The full conversion pipeline also removes duplicate linestrips,
//! contracts linestrips shorter than the road width, triangulates
//! junctions and dead-end caps on request, and merges everything into a
//! single vertex/triangle batch.

use std::collections::HashMap;

use crate::debug::DebugLines;
use crate::geometry::{Linestrip, Mat3, Triangle, Vec3, Vertex};

use super::junction::{triangulate_cap, triangulate_junction, JunctionPatch};
use super::topology::{extract_intersections, remove_duplicate_linestrips};

/// Debug colours for the short-linestrip contraction pass.
const DEBUG_TOUCHED: Vec3 = Vec3::new(0.0, 0.0, 1.0);
const DEBUG_REWRITTEN: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Parameters of one ribbon conversion job.
#[derive(Debug, Clone)]
pub struct RibbonParams {
    /// Half-width of the ribbon: rails are offset by this amount on each
    /// side of the centerline.
    pub width: f32,
    /// Transform applied to the unit UV coordinates of the ribbon.
    pub texture_matrix: Mat3,
    /// Extrude a rectangular cap at every dead end.
    pub triangulate_caps: bool,
    /// Resolve junction geometry (weld / snap / clip / fan fill).
    pub triangulate_intersections: bool,
}

/// A triangulated linestrip: the logical linestrip plus its local rail
/// vertices and triangles. Rail vertices are addressed by their local
/// index; nothing holds references into the buffer across mutation.
#[derive(Debug, Clone)]
pub struct Ribbon {
    pub linestrip: Linestrip,
    pub coordinates: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

/// Counters reported by [`convert_linestrips`] for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RibbonStats {
    pub duplicates_removed: usize,
    pub short_linestrips_removed: usize,
    pub junctions: usize,
    pub dead_ends: usize,
}

/// Extrudes a single 2D line segment into a quad of rail vertices:
/// `[a_left, a_right, b_left, b_right]`.
fn extrude_segment(a: Vec3, b: Vec3, width: f32, texture_matrix: &Mat3) -> [Vertex; 4] {
    let perp = Vec3::new(-(b.y - a.y), b.x - a.x, 0.0).normalized();
    [
        Vertex {
            position: a - perp * width,
            texcoord: texture_matrix.transform_uv(0.0, 0.0),
        },
        Vertex {
            position: a + perp * width,
            texcoord: texture_matrix.transform_uv(1.0, 0.0),
        },
        Vertex {
            position: b - perp * width,
            texcoord: texture_matrix.transform_uv(0.0, 0.0),
        },
        Vertex {
            position: b + perp * width,
            texcoord: texture_matrix.transform_uv(1.0, 0.0),
        },
    ]
}

/// Triangulates one linestrip into a ribbon of the given width.
///
/// Each segment contributes two rail vertices per endpoint and two
/// triangles. At every interior joint the two shared rail vertices are
/// recomputed: cast from the original centerline point along the
/// interpolated rail direction and scaled by `1 / cos(theta)`, where
/// theta is the angle between the interpolated and the original rail
/// direction. This is a true miter join, not an average.
pub fn triangulate_linestrip(
    coordinates: &[Vertex],
    linestrip: &Linestrip,
    width: f32,
    texture_matrix: &Mat3,
) -> Ribbon {
    let mut ribbon = Ribbon {
        linestrip: linestrip.clone(),
        coordinates: Vec::new(),
        triangles: Vec::new(),
    };
    let point_count = linestrip.indices.len();
    if point_count < 2 {
        return ribbon;
    }
    ribbon.coordinates.reserve(point_count * 2);

    // First segment
    let quad = extrude_segment(
        coordinates[linestrip.indices[0] as usize].position,
        coordinates[linestrip.indices[1] as usize].position,
        width,
        texture_matrix,
    );
    ribbon.coordinates.extend_from_slice(&quad);
    ribbon.triangles.push(Triangle::new(0, 1, 3));
    ribbon.triangles.push(Triangle::new(0, 3, 2));

    // Remaining segments share the two rail vertices at each joint
    for i in 1..point_count - 1 {
        let index = i * 2;
        let a = coordinates[linestrip.indices[i] as usize].position;
        let b = coordinates[linestrip.indices[i + 1] as usize].position;
        let quad = extrude_segment(a, b, width, texture_matrix);

        // Interpolate the joint rail positions between the previous
        // segment's far edge and this segment's near edge
        let interp_a = (ribbon.coordinates[index].position + quad[0].position) * 0.5;
        let interp_b = (ribbon.coordinates[index + 1].position + quad[1].position) * 0.5;

        // Correct the angle-dependent narrowing: scale by the inverse
        // cosine of the angle between the interpolated rail direction
        // and the original one.
        let a_dir = (interp_a - a).normalized();
        let b_dir = (interp_b - a).normalized();
        let org_dir = (ribbon.coordinates[index].position - a).normalized();
        let cos_angle = a_dir.dot(org_dir);
        let corr_scale = 1.0 / cos_angle;
        ribbon.coordinates[index].position = a + a_dir * width * corr_scale;
        ribbon.coordinates[index + 1].position = a + b_dir * width * corr_scale;

        ribbon.coordinates.push(quad[2]);
        ribbon.coordinates.push(quad[3]);

        let index = index as u32;
        ribbon.triangles.push(Triangle::new(index, index + 1, index + 3));
        ribbon.triangles.push(Triangle::new(index, index + 3, index + 2));
    }

    ribbon
}

/// Removes every linestrip shorter than `width` by contracting its two
/// endpoint identifiers into one: the `start_id` survives and every
/// other linestrip referencing the doomed `end_id` is rewritten to the
/// survivor. Returns the number of removed linestrips. The caller must
/// rebuild the intersection topology afterwards.
pub fn contract_short_linestrips(
    coordinates: &[Vertex],
    linestrips: &mut Vec<Linestrip>,
    width: f32,
    mut debug: Option<&mut DebugLines>,
) -> usize {
    let mut removed = 0;
    let mut i = 0;
    while i < linestrips.len() {
        if linestrips[i].length(coordinates) >= width {
            i += 1;
            continue;
        }

        let replacer = linestrips[i].start_id;
        let to_replace = linestrips[i].end_id;
        linestrips.remove(i);
        removed += 1;

        for other in linestrips.iter_mut() {
            if let Some(lines) = debug.as_deref_mut() {
                if other.start_id == replacer || other.end_id == replacer {
                    lines.push_linestrip(DEBUG_TOUCHED, coordinates, other);
                }
            }
            if other.end_id == to_replace {
                other.end_id = replacer;
                if let Some(lines) = debug.as_deref_mut() {
                    lines.push_linestrip(DEBUG_REWRITTEN, coordinates, other);
                }
            }
            if other.start_id == to_replace {
                other.start_id = replacer;
                if let Some(lines) = debug.as_deref_mut() {
                    lines.push_linestrip(DEBUG_REWRITTEN, coordinates, other);
                }
            }
        }
    }
    removed
}

/// Converts a set of linestrips into a single merged vertex/triangle
/// batch of road ribbons.
///
/// Pipeline: duplicate removal, short-linestrip contraction, topology
/// rebuild, per-linestrip ribbon extrusion, optional junction and
/// dead-end cap triangulation, and the final merge. Per-ribbon vertices
/// are deduplicated on first use during the merge; junction patch
/// triangles are appended with freshly allocated vertices.
pub fn convert_linestrips(
    coordinates: &[Vertex],
    linestrips: &[Linestrip],
    params: &RibbonParams,
    mut debug: Option<&mut DebugLines>,
) -> (Vec<Vertex>, Vec<Triangle>, RibbonStats) {
    let mut stats = RibbonStats::default();

    let topology = extract_intersections(linestrips);
    let (mut reduced, duplicates) = remove_duplicate_linestrips(linestrips, &topology);
    stats.duplicates_removed = duplicates;

    stats.short_linestrips_removed =
        contract_short_linestrips(coordinates, &mut reduced, params.width, debug.as_deref_mut());

    // Endpoint identifiers changed above, so the topology must be rebuilt
    let topology = extract_intersections(&reduced);
    stats.junctions = topology.junctions.len();
    stats.dead_ends = topology.dead_ends.len();

    eprintln!(
        "Triangulating {} linestrips ({} duplicates, {} short linestrips removed)",
        reduced.len(),
        stats.duplicates_removed,
        stats.short_linestrips_removed
    );
    let mut ribbons: Vec<Ribbon> = reduced
        .iter()
        .map(|linestrip| {
            triangulate_linestrip(coordinates, linestrip, params.width, &params.texture_matrix)
        })
        .collect();

    let mut patches: Vec<JunctionPatch> = Vec::new();
    if params.triangulate_intersections {
        eprintln!("Triangulating {} junctions", topology.junctions.len());
        for &j in &topology.junctions {
            patches.push(triangulate_junction(
                coordinates,
                &topology.intersections[j],
                &mut ribbons,
            ));
        }
    }

    let mut out_coordinates = Vec::new();
    let mut out_triangles = Vec::new();

    if params.triangulate_caps {
        eprintln!("Capping {} dead ends", topology.dead_ends.len());
        for &d in &topology.dead_ends {
            triangulate_cap(
                &ribbons,
                &topology.intersections[d],
                params.width,
                &params.texture_matrix,
                &mut out_coordinates,
                &mut out_triangles,
            );
        }
    }

    // Merge the per-ribbon buffers into the shared output, deduplicating
    // each ribbon's vertices on first use
    let triangle_count: usize = ribbons.iter().map(|r| r.triangles.len()).sum();
    let vertex_count: usize = ribbons.iter().map(|r| r.coordinates.len()).sum();
    out_triangles.reserve(triangle_count);
    out_coordinates.reserve(vertex_count);

    for ribbon in &ribbons {
        let mut mapping: HashMap<u32, u32> = HashMap::new();
        for triangle in &ribbon.triangles {
            let mut remap = |local: u32| -> u32 {
                *mapping.entry(local).or_insert_with(|| {
                    let global = out_coordinates.len() as u32;
                    out_coordinates.push(ribbon.coordinates[local as usize]);
                    global
                })
            };
            let a = remap(triangle.a);
            let b = remap(triangle.b);
            let c = remap(triangle.c);
            out_triangles.push(Triangle::new(a, b, c));
        }
    }

    // Junction patch triangles reference their own private vertices
    for patch in &patches {
        for triangle in &patch.triangles {
            let base = out_coordinates.len() as u32;
            out_coordinates.push(patch.coordinates[triangle.a as usize]);
            out_coordinates.push(patch.coordinates[triangle.b as usize]);
            out_coordinates.push(patch.coordinates[triangle.c as usize]);
            out_triangles.push(Triangle::new(base, base + 1, base + 2));
        }
    }

    (out_coordinates, out_triangles, stats)
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

    fn linestrip(start_id: i32, end_id: i32, indices: Vec<u32>) -> Linestrip {
        Linestrip {
            start_id,
            end_id,
            func_class: 0,
            indices,
        }
    }

    fn params(width: f32) -> RibbonParams {
        RibbonParams {
            width,
            texture_matrix: Mat3::IDENTITY,
            triangulate_caps: false,
            triangulate_intersections: false,
        }
    }

    #[test]
    fn test_straight_ribbon_width() {
        let coordinates = vec![vertex(0.0, 0.0), vertex(10.0, 0.0)];
        let strip = linestrip(1, 2, vec![0, 1]);
        let ribbon = triangulate_linestrip(&coordinates, &strip, 2.0, &Mat3::IDENTITY);

        assert_eq!(ribbon.coordinates.len(), 4);
        assert_eq!(ribbon.triangles.len(), 2);
        // Rail separation is twice the half-width at both cross-sections
        for i in [0, 2] {
            let left = ribbon.coordinates[i].position;
            let right = ribbon.coordinates[i + 1].position;
            assert!(((right - left).length() - 4.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_miter_join_prevents_narrowing() {
        // Right-angle turn: the miter at the joint must sit at
        // width * sqrt(2) from the centerline point.
        let coordinates = vec![vertex(0.0, 0.0), vertex(10.0, 0.0), vertex(10.0, 10.0)];
        let strip = linestrip(1, 2, vec![0, 1, 2]);
        let width = 1.0;
        let ribbon = triangulate_linestrip(&coordinates, &strip, width, &Mat3::IDENTITY);

        assert_eq!(ribbon.coordinates.len(), 6);
        assert_eq!(ribbon.triangles.len(), 4);
        let joint = Vec3::new(10.0, 0.0, 0.0);
        for i in [2, 3] {
            let dist = (ribbon.coordinates[i].position - joint).length();
            assert!((dist - width * std::f32::consts::SQRT_2).abs() < 1e-4);
        }
    }

    #[test]
    fn test_contract_short_linestrip_rewrites_references() {
        // Strip 1 -> 2 of length 2 with width 5: removed, and the other
        // linestrip's reference to 2 is rewritten to 1.
        let coordinates = vec![vertex(0.0, 0.0), vertex(2.0, 0.0), vertex(12.0, 0.0)];
        let mut linestrips = vec![
            linestrip(1, 2, vec![0, 1]),
            linestrip(2, 3, vec![1, 2]),
        ];
        let removed = contract_short_linestrips(&coordinates, &mut linestrips, 5.0, None);
        assert_eq!(removed, 1);
        assert_eq!(linestrips.len(), 1);
        assert_eq!(linestrips[0].start_id, 1);
        assert_eq!(linestrips[0].end_id, 3);
    }

    #[test]
    fn test_convert_merges_and_deduplicates() {
        // One three-point strip: 6 unique rail vertices, 4 triangles
        let coordinates = vec![vertex(0.0, 0.0), vertex(10.0, 0.0), vertex(20.0, 0.0)];
        let linestrips = vec![linestrip(1, 2, vec![0, 1, 2])];
        let (verts, triangles, stats) =
            convert_linestrips(&coordinates, &linestrips, &params(1.0), None);

        assert_eq!(triangles.len(), 4);
        assert_eq!(verts.len(), 6);
        assert_eq!(stats.duplicates_removed, 0);
        assert_eq!(stats.dead_ends, 2);
        assert!(triangles.iter().all(|t| {
            (t.a as usize) < verts.len() && (t.b as usize) < verts.len() && (t.c as usize) < verts.len()
        }));
    }

    #[test]
    fn test_convert_with_caps_extrudes_dead_ends() {
        let coordinates = vec![vertex(0.0, 0.0), vertex(10.0, 0.0)];
        let linestrips = vec![linestrip(1, 2, vec![0, 1])];
        let mut p = params(1.0);
        p.triangulate_caps = true;
        let (verts, triangles, stats) = convert_linestrips(&coordinates, &linestrips, &p, None);

        // 2 caps of 4 vertices / 2 triangles each, plus the ribbon quad
        assert_eq!(stats.dead_ends, 2);
        assert_eq!(verts.len(), 8 + 4);
        assert_eq!(triangles.len(), 4 + 2);

        // Caps extend the layer by one width on each side
        let min_x = verts.iter().map(|v| v.position.x).fold(f32::MAX, f32::min);
        let max_x = verts.iter().map(|v| v.position.x).fold(f32::MIN, f32::max);
        assert!((min_x + 1.0).abs() < 1e-5);
        assert!((max_x - 11.0).abs() < 1e-5);
    }

    #[test]
    fn test_convert_removes_duplicates() {
        let coordinates = vec![vertex(0.0, 0.0), vertex(10.0, 0.0)];
        let linestrips = vec![
            linestrip(1, 2, vec![0, 1]),
            linestrip(2, 1, vec![1, 0]),
        ];
        let (_, triangles, stats) = convert_linestrips(&coordinates, &linestrips, &params(1.0), None);
        assert_eq!(stats.duplicates_removed, 1);
        // Only one ribbon quad remains
        assert_eq!(triangles.len(), 2);
    }
}
