//! Junction and dead-end triangulation
//!
//! Runs once per intersection after all ribbons exist. Dead ends get a
//! rectangular cap extruded outward. At junctions, the incident ribbon
//! ends are sorted by angle and every adjacent pair is resolved: caps at
//! identical angles are welded, near-straight pairs are snapped to the
//! intersection of their outward rails, and everything else clips the
//! two ribbons' offset rails against each other. Pairs left open are
//! patched with a triangle fan around a computed midpoint.
//!
//! Rail vertices are always addressed by `(ribbon index, local vertex
//! index)`; no reference is held across an operation that could move a
//! ribbon's buffer.

use crate::geometry::{Mat3, Triangle, Vec2, Vec3, Vertex};

use super::ribbon::Ribbon;
use super::topology::Intersection;

const TWO_PI: f32 = std::f32::consts::TAU;

/// Pairs closer to straight-through than this are resolved by snapping
/// to the intersection of their outward rays instead of rail clipping.
const PASS_THROUGH_DEGREES: f32 = 175.0;

/// Extra triangles generated for one junction. Patch triangles index
/// into the patch's own vertex list; the merge step allocates fresh
/// output vertices for them.
#[derive(Debug, Clone, Default)]
pub struct JunctionPatch {
    pub coordinates: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

/// A stable reference to one rail vertex of one ribbon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RailRef {
    ribbon: usize,
    vertex: usize,
}

/// The two rail vertices terminating a ribbon at an intersection, plus
/// the direction pointing away from it and the sort angle.
#[derive(Debug, Clone, Copy)]
struct CapPair {
    ribbon: usize,
    v0: RailRef,
    v1: RailRef,
    dir: Vec3,
    angle: f32,
}

fn rail_position(ribbons: &[Ribbon], r: RailRef) -> Vec3 {
    ribbons[r.ribbon].coordinates[r.vertex].position
}

fn rail_vertex(ribbons: &[Ribbon], r: RailRef) -> Vertex {
    ribbons[r.ribbon].coordinates[r.vertex]
}

fn set_rail_position(ribbons: &mut [Ribbon], r: RailRef, position: Vec3) {
    ribbons[r.ribbon].coordinates[r.vertex].position = position;
}

/// Intersection parameters (u, v) of the infinite lines p1-p2 and p3-p4,
/// or `None` if the lines are parallel.
fn line_intersection_params(p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3) -> Option<(f32, f32)> {
    let denom = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);
    if denom.abs() < 1e-9 {
        return None;
    }
    let denom = 1.0 / denom;
    let u = ((p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x)) * denom;
    let v = ((p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x)) * denom;
    Some((u, v))
}

/// 2D intersection point of two lines given in point + direction form.
fn line_intersection(a_pos: Vec3, a_dir: Vec3, b_pos: Vec3, b_dir: Vec3) -> Option<Vec3> {
    let p2 = a_pos + a_dir;
    let p4 = b_pos + b_dir;
    let (u, _) = line_intersection_params(a_pos, p2, b_pos, p4)?;
    Some(a_pos + (p2 - a_pos) * u)
}

/// 2D intersection point of two line segments; `None` when the segments
/// do not actually cross.
fn segment_intersection(p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3) -> Option<Vec3> {
    let (u, v) = line_intersection_params(p1, p2, p3, p4)?;
    if (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v) {
        Some(p1 + (p2 - p1) * u)
    } else {
        None
    }
}

/// Collects the rail vertex indices of the ribbon side that faces the
/// other ribbon at the given intersection, ordered walking away from it.
fn facing_rail(ribbon: &Ribbon, intersection_id: i32, near_side: bool) -> Vec<usize> {
    let count = ribbon.coordinates.len();
    if ribbon.linestrip.start_id == intersection_id {
        let first = if near_side { 1 } else { 0 };
        (first..count).step_by(2).collect()
    } else if near_side {
        (0..count).step_by(2).rev().collect()
    } else {
        (1..count).step_by(2).rev().collect()
    }
}

/// Clips the facing rails of two ribbons against each other: walks both
/// rails outward from the junction, finds the first crossing segment
/// pair, and snaps every rail vertex up to and including the crossing on
/// both sides to the intersection point. Returns false when the rails do
/// not cross.
fn clip_ribbon_rails(ribbons: &mut [Ribbon], a: usize, b: usize, intersection_id: i32) -> bool {
    let rail_a = facing_rail(&ribbons[a], intersection_id, true);
    let rail_b = facing_rail(&ribbons[b], intersection_id, false);

    let pos = |ribbon: usize, local: usize| ribbons[ribbon].coordinates[local].position;

    let mut hit: Option<(usize, usize, Vec3)> = None;
    'outer: for i in 0..rail_a.len() - 1 {
        let a0 = pos(a, rail_a[i]);
        let a1 = pos(a, rail_a[i + 1]);
        for j in 0..rail_b.len() - 1 {
            let b0 = pos(b, rail_b[j]);
            let b1 = pos(b, rail_b[j + 1]);
            if let Some(point) = segment_intersection(a0, a1, b0, b1) {
                hit = Some((i, j, point));
                break 'outer;
            }
        }
    }

    let Some((seg_a, seg_b, point)) = hit else {
        return false;
    };
    for &local in &rail_a[..=seg_a] {
        ribbons[a].coordinates[local].position = point;
    }
    for &local in &rail_b[..=seg_b] {
        ribbons[b].coordinates[local].position = point;
    }
    true
}

/// Builds the cap pair of one ribbon at an intersection: the two rail
/// vertices nearest to it and the centerline direction pointing away.
fn cap_pair(coordinates: &[Vertex], ribbons: &[Ribbon], ribbon: usize, intersection_id: i32) -> CapPair {
    let linestrip = &ribbons[ribbon].linestrip;
    if linestrip.start_id == intersection_id {
        let dir = coordinates[linestrip.indices[1] as usize].position
            - coordinates[linestrip.indices[0] as usize].position;
        CapPair {
            ribbon,
            v0: RailRef { ribbon, vertex: 0 },
            v1: RailRef { ribbon, vertex: 1 },
            dir: dir.normalized(),
            angle: 0.0,
        }
    } else {
        let count = ribbons[ribbon].coordinates.len();
        let line_count = linestrip.indices.len();
        let dir = coordinates[linestrip.indices[line_count - 2] as usize].position
            - coordinates[linestrip.indices[line_count - 1] as usize].position;
        CapPair {
            ribbon,
            v1: RailRef { ribbon, vertex: count - 2 },
            v0: RailRef { ribbon, vertex: count - 1 },
            dir: dir.normalized(),
            angle: 0.0,
        }
    }
}

/// Triangulates one junction of two or more ribbons, mutating their
/// boundary rail vertices in place and returning the fan-fill patch.
pub fn triangulate_junction(
    coordinates: &[Vertex],
    intersection: &Intersection,
    ribbons: &mut [Ribbon],
) -> JunctionPatch {
    let mut patch = JunctionPatch::default();
    let num_intersecting = intersection.linestrips.len();

    // Dead ends are handled by the cap pass
    if num_intersecting < 2 {
        return patch;
    }

    let mut cap_pairs: Vec<CapPair> = intersection
        .linestrips
        .iter()
        .map(|&i| cap_pair(coordinates, ribbons, i, intersection.id))
        .collect();

    // The first ribbon is the angular reference; every other angle is
    // offset against it into [0, 4*pi) so the sort order is total.
    cap_pairs[0].angle = TWO_PI;
    let ref_angle = cap_pairs[0].dir.y.atan2(cap_pairs[0].dir.x);
    for cap in cap_pairs.iter_mut().skip(1) {
        cap.angle = cap.dir.y.atan2(cap.dir.x) - ref_angle + TWO_PI;
    }
    cap_pairs.sort_by(|a, b| a.angle.total_cmp(&b.angle));

    // Walk adjacent pairs, wrapping around
    let mut hole_fillers: Vec<CapPair> = Vec::new();
    let mut identical_caps: Vec<usize> = Vec::new();
    let mut i = cap_pairs.len() - 1;
    for j in 0..cap_pairs.len() {
        let left_cap = cap_pairs[i];
        let right_cap = cap_pairs[j];

        // Two-way junctions close themselves; everything else starts out
        // as a hole candidate.
        let mut patch_hole = num_intersecting > 2;

        let angle = right_cap.angle - left_cap.angle;
        let mut angle_degree = (angle / TWO_PI) * 360.0;
        if angle_degree < 0.0 {
            angle_degree += 360.0;
        }

        if angle == 0.0 && num_intersecting > 2 {
            // Geometrically coincident caps are welded after the loop
            identical_caps.push(i);
            i = j;
            continue;
        } else if angle_degree > PASS_THROUGH_DEGREES {
            let snap = line_intersection(
                rail_position(ribbons, left_cap.v1),
                left_cap.dir,
                rail_position(ribbons, right_cap.v0),
                right_cap.dir,
            );
            match snap {
                Some(point) => {
                    set_rail_position(ribbons, left_cap.v1, point);
                    set_rail_position(ribbons, right_cap.v0, point);
                }
                None => {
                    // Parallel outward rays: leave no silent gap, queue
                    // the pair for the fan fill instead.
                    eprintln!(
                        "Near-straight pair without ray intersection at junction {}, fan-filling",
                        intersection.id
                    );
                    patch_hole = true;
                }
            }
        } else if !clip_ribbon_rails(ribbons, left_cap.ribbon, right_cap.ribbon, intersection.id) {
            patch_hole = true;
        }

        if patch_hole {
            hole_fillers.push(left_cap);
        }
        i = j;
    }

    // Weld identical caps: each takes over the neighbouring cap's
    // already-resolved intersection positions.
    for &left_index in &identical_caps {
        let right_index = if left_index == cap_pairs.len() - 1 { 0 } else { left_index + 1 };
        let left_cap = cap_pairs[left_index];
        let right_cap = cap_pairs[right_index];
        let right_v1 = rail_position(ribbons, right_cap.v1);
        let left_v0 = rail_position(ribbons, left_cap.v0);
        set_rail_position(ribbons, left_cap.v1, right_v1);
        set_rail_position(ribbons, right_cap.v0, left_v0);
    }

    if hole_fillers.is_empty() {
        return patch;
    }

    // Fan apex: the average of all unresolved cap vertices
    let mut midpoint_position = Vec3::default();
    for cap in &hole_fillers {
        midpoint_position = midpoint_position + rail_position(ribbons, cap.v0);
        midpoint_position = midpoint_position + rail_position(ribbons, cap.v1);
    }
    midpoint_position = midpoint_position * (1.0 / (hole_fillers.len() * 2) as f32);

    let midpoint_index = patch.coordinates.len() as u32;
    patch.coordinates.push(Vertex {
        position: midpoint_position,
        texcoord: Vec2::new(0.25, 0.0),
    });

    for cap in &hole_fillers {
        let index = patch.coordinates.len() as u32;
        patch.coordinates.push(rail_vertex(ribbons, cap.v0));
        patch.coordinates.push(rail_vertex(ribbons, cap.v1));
        patch.triangles.push(Triangle::new(midpoint_index, index, index + 1));
    }

    patch
}

/// Extrudes a rectangular cap of length `width` at a dead end, appending
/// its vertices and triangles to the output batch. A dead-end identifier
/// claimed by more than one linestrip indicates inconsistent topology;
/// it is logged and skipped.
pub fn triangulate_cap(
    ribbons: &[Ribbon],
    intersection: &Intersection,
    width: f32,
    texture_matrix: &Mat3,
    out_coordinates: &mut Vec<Vertex>,
    out_triangles: &mut Vec<Triangle>,
) {
    let cap_length = width;

    if intersection.linestrips.len() > 1 {
        eprintln!(
            "Error: more than one linestrip at dead end {}, skipping cap",
            intersection.id
        );
        return;
    }

    let ribbon = &ribbons[intersection.linestrips[0]];
    let count = ribbon.coordinates.len();

    let (cap_pos0, cap_pos1, cap_dir) = if ribbon.linestrip.start_id == intersection.id {
        let dir = ribbon.coordinates[0].position - ribbon.coordinates[2].position;
        (
            ribbon.coordinates[0].position,
            ribbon.coordinates[1].position,
            dir.normalized(),
        )
    } else if ribbon.linestrip.end_id == intersection.id {
        let dir = ribbon.coordinates[count - 1].position - ribbon.coordinates[count - 3].position;
        (
            ribbon.coordinates[count - 2].position,
            ribbon.coordinates[count - 1].position,
            dir.normalized(),
        )
    } else {
        eprintln!(
            "Error: dead end {} matches neither end of its linestrip, skipping cap",
            intersection.id
        );
        return;
    };

    let start_index = out_coordinates.len() as u32;
    out_coordinates.push(Vertex {
        position: cap_pos0 + cap_dir * cap_length,
        texcoord: texture_matrix.transform_uv(0.0, 1.0),
    });
    out_coordinates.push(Vertex {
        position: cap_pos1 + cap_dir * cap_length,
        texcoord: texture_matrix.transform_uv(1.0, 1.0),
    });
    out_coordinates.push(Vertex {
        position: cap_pos0,
        texcoord: texture_matrix.transform_uv(0.0, 0.0),
    });
    out_coordinates.push(Vertex {
        position: cap_pos1,
        texcoord: texture_matrix.transform_uv(1.0, 0.0),
    });

    out_triangles.push(Triangle::new(start_index + 1, start_index, start_index + 3));
    out_triangles.push(Triangle::new(start_index + 3, start_index, start_index + 2));
}
