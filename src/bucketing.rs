//! Spatial bucketization of compiled layers
//!
//! Splits a compiled layer into a regular grid of coordinate buckets and
//! recursively quad-subdivided index sets for two-level culling: the
//! renderer first culls whole buckets against the view frustum, then the
//! index sets within the surviving buckets.
//!
//! Buckets hold deduplicated local vertex subsets addressed with 16-bit
//! indices. A grid cell whose vertex subset would not fit the 16-bit
//! budget is not an error: the cell is discarded and its bounding box is
//! quad-subdivided back onto the work queue until every surviving cell
//! fits. Primitives crossing cell borders are duplicated into every cell
//! they touch; omission is never allowed, duplication is.

use std::collections::{HashMap, VecDeque};

use anyhow::Result;

use crate::geometry::{
    BoundingBox2D, BucketIndexSet, BucketMapLayer, CompactIndex, CompactTriangle,
    CoordinateBucket, MapLayer, QuadVertex, RenderIndexSet, Triangle, Vec2, Vertex,
};

/// Tests a triangle (given by its three corner positions) against an
/// axis-aligned box. Exact for the common cases: any corner inside the
/// box, or all three corners beyond the same box edge. Triangles passing
/// both checks fall back to a bounding-box overlap test, which may
/// accept a near-miss; the bucketizer tolerates false positives.
fn triangle_intersects_bounds(a: Vertex, b: Vertex, c: Vertex, bounds: &BoundingBox2D) -> bool {
    let (pa, pb, pc) = (a.position, b.position, c.position);

    if bounds.contains_xy(pa) || bounds.contains_xy(pb) || bounds.contains_xy(pc) {
        return true;
    }

    if pa.x < bounds.min.x && pb.x < bounds.min.x && pc.x < bounds.min.x {
        return false;
    }
    if pa.x > bounds.max.x && pb.x > bounds.max.x && pc.x > bounds.max.x {
        return false;
    }
    if pa.y < bounds.min.y && pb.y < bounds.min.y && pc.y < bounds.min.y {
        return false;
    }
    if pa.y > bounds.max.y && pb.y > bounds.max.y && pc.y > bounds.max.y {
        return false;
    }

    let mut triangle_box = BoundingBox2D::from_point(pa.xy());
    triangle_box.extend(pb);
    triangle_box.extend(pc);
    bounds.overlaps(&triangle_box)
}

/// Label quads are culled by their anchor point alone; the renderer
/// expands them in screen space, so their world extent is the anchor.
fn quad_intersects_bounds(anchor: QuadVertex, bounds: &BoundingBox2D) -> bool {
    bounds.contains(anchor.origin)
}

/// A grid cell's extracted content before index subdivision: local
/// deduplicated vertices plus triangles over them, still as full-width
/// indices.
#[derive(Debug, Default)]
struct CellContent {
    coordinates: Vec<Vertex>,
    quad_vertices: Vec<QuadVertex>,
    triangles: Vec<Triangle>,
    quad_triangles: Vec<Triangle>,
}

impl CellContent {
    fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.quad_triangles.is_empty()
    }

    fn vertex_count(&self) -> usize {
        self.coordinates.len().max(self.quad_vertices.len())
    }
}

/// Extracts every triangle and label quad of the layer intersecting the
/// given bounds into a fresh local vertex subset, remapping each layer
/// vertex on first use.
fn fill_cell(layer: &MapLayer, bounds: &BoundingBox2D) -> CellContent {
    let mut cell = CellContent::default();

    let mut mapping: HashMap<u32, u32> = HashMap::new();
    for triangle in &layer.index_set.triangles {
        let a = layer.coordinates[triangle.a as usize];
        let b = layer.coordinates[triangle.b as usize];
        let c = layer.coordinates[triangle.c as usize];
        if !triangle_intersects_bounds(a, b, c, bounds) {
            continue;
        }
        let mut remap = |global: u32| -> u32 {
            *mapping.entry(global).or_insert_with(|| {
                let local = cell.coordinates.len() as u32;
                cell.coordinates.push(layer.coordinates[global as usize]);
                local
            })
        };
        let a = remap(triangle.a);
        let b = remap(triangle.b);
        let c = remap(triangle.c);
        cell.triangles.push(Triangle::new(a, b, c));
    }

    let mut quad_mapping: HashMap<u32, u32> = HashMap::new();
    for triangle in &layer.index_set.quad_triangles {
        let anchor = layer.quad_vertices[triangle.a as usize];
        if !quad_intersects_bounds(anchor, bounds) {
            continue;
        }
        let mut remap = |global: u32| -> u32 {
            *quad_mapping.entry(global).or_insert_with(|| {
                let local = cell.quad_vertices.len() as u32;
                cell.quad_vertices.push(layer.quad_vertices[global as usize]);
                local
            })
        };
        let a = remap(triangle.a);
        let b = remap(triangle.b);
        let c = remap(triangle.c);
        cell.quad_triangles.push(Triangle::new(a, b, c));
    }

    cell
}

/// Tight bounding box of the triangles' corner positions plus the quad
/// anchors, all in local coordinates.
fn primitive_bounds(
    coordinates: &[Vertex],
    quad_vertices: &[QuadVertex],
    triangles: &[Triangle],
    quad_triangles: &[Triangle],
) -> BoundingBox2D {
    let mut bounds: Option<BoundingBox2D> = None;
    let mut include = |point: Vec2| match bounds.as_mut() {
        Some(bbox) => {
            bbox.extend(crate::geometry::Vec3::new(point.x, point.y, 0.0));
        }
        None => bounds = Some(BoundingBox2D::from_point(point)),
    };
    for triangle in triangles {
        include(coordinates[triangle.a as usize].position.xy());
        include(coordinates[triangle.b as usize].position.xy());
        include(coordinates[triangle.c as usize].position.xy());
    }
    for triangle in quad_triangles {
        include(quad_vertices[triangle.a as usize].origin);
    }
    bounds.unwrap_or_default()
}

fn compact_triangles(triangles: &[Triangle]) -> Result<Vec<CompactTriangle>> {
    triangles
        .iter()
        .map(|t| CompactTriangle::new(t.a as usize, t.b as usize, t.c as usize))
        .collect()
}

/// Recursively quad-subdivides an index set within one bucket. Vertex
/// data is shared; only the triangle lists are split per quadrant. A
/// branch stops subdividing when it is at or below the primitive floor
/// or out of recursion levels, and is then emitted as a leaf index set.
#[allow(clippy::too_many_arguments)]
fn subdivide_index_set(
    bucket: u32,
    coordinates: &[Vertex],
    quad_vertices: &[QuadVertex],
    triangles: Vec<Triangle>,
    quad_triangles: Vec<Triangle>,
    bounds: BoundingBox2D,
    levels_left: u32,
    min_primitive_count: usize,
    out: &mut Vec<BucketIndexSet>,
) -> Result<()> {
    let primitive_count = triangles.len() + quad_triangles.len();
    if primitive_count == 0 {
        return Ok(());
    }

    if levels_left == 0 || primitive_count <= min_primitive_count {
        out.push(BucketIndexSet {
            bucket,
            bounding_box: primitive_bounds(coordinates, quad_vertices, &triangles, &quad_triangles),
            index_set: RenderIndexSet {
                triangles: compact_triangles(&triangles)?,
                quad_triangles: compact_triangles(&quad_triangles)?,
            },
        });
        return Ok(());
    }

    for quadrant in bounds.subdivide() {
        let sub_triangles: Vec<Triangle> = triangles
            .iter()
            .filter(|t| {
                triangle_intersects_bounds(
                    coordinates[t.a as usize],
                    coordinates[t.b as usize],
                    coordinates[t.c as usize],
                    &quadrant,
                )
            })
            .copied()
            .collect();
        let sub_quads: Vec<Triangle> = quad_triangles
            .iter()
            .filter(|t| quad_intersects_bounds(quad_vertices[t.a as usize], &quadrant))
            .copied()
            .collect();

        subdivide_index_set(
            bucket,
            coordinates,
            quad_vertices,
            sub_triangles,
            sub_quads,
            quadrant,
            levels_left - 1,
            min_primitive_count,
            out,
        )?;
    }
    Ok(())
}

/// Rebases every vertex of a bucket to its bounding box minimum corner,
/// so the renderer can use reduced-precision local coordinates.
fn rebase_bucket(bucket: &mut CoordinateBucket) {
    let origin = bucket.bounding_box.min;
    for vertex in &mut bucket.coordinates {
        vertex.position.x -= origin.x;
        vertex.position.y -= origin.y;
    }
    for quad in &mut bucket.quad_vertices {
        quad.origin = quad.origin - origin;
    }
}

/// Bucketizes a compiled layer.
///
/// The layer bounding box is covered by a regular grid of
/// `2^bucket_recursions + 1` cells per axis. Every cell with content
/// becomes a coordinate bucket whose index set is then quad-subdivided
/// for `index_recursions` levels, stopping early at
/// `min_primitive_count` primitives. Oversized cells re-enter the work
/// queue as their four quadrants until their vertex subsets fit 16-bit
/// indices; afterwards all bucket vertices are rebased to their bucket's
/// minimum corner.
pub fn bucketize_layer(
    layer: &MapLayer,
    bucket_recursions: u32,
    index_recursions: u32,
    min_primitive_count: usize,
) -> Result<BucketMapLayer> {
    let mut bucket_layer = BucketMapLayer {
        bounding_box: layer.bounding_box,
        ..Default::default()
    };

    let num_subdivs = (1u32 << bucket_recursions) + 1;
    let cell_size = Vec2::new(
        layer.bounding_box.width() / num_subdivs as f32,
        layer.bounding_box.height() / num_subdivs as f32,
    );

    let mut work_queue: VecDeque<BoundingBox2D> = VecDeque::new();
    for y in 0..num_subdivs {
        for x in 0..num_subdivs {
            let min = Vec2::new(
                layer.bounding_box.min.x + cell_size.x * x as f32,
                layer.bounding_box.min.y + cell_size.y * y as f32,
            );
            work_queue.push_back(BoundingBox2D::new(min, min + cell_size));
        }
    }

    let mut empty_cells = 0usize;
    let mut overflowed_cells = 0usize;

    while let Some(bounds) = work_queue.pop_front() {
        let cell = fill_cell(layer, &bounds);
        if cell.is_empty() {
            empty_cells += 1;
            continue;
        }

        if cell.vertex_count() > CompactIndex::MAX {
            // Does not fit a 16-bit index buffer: re-enter as quadrants
            overflowed_cells += 1;
            work_queue.extend(bounds.subdivide());
            continue;
        }

        // A bucket holds either triangle vertices or label quad
        // vertices, never both; a mixed cell becomes two buckets.
        if !cell.triangles.is_empty() {
            let bucket = bucket_layer.coordinate_buckets.len() as u32;
            subdivide_index_set(
                bucket,
                &cell.coordinates,
                &[],
                cell.triangles,
                Vec::new(),
                bounds,
                index_recursions,
                min_primitive_count,
                &mut bucket_layer.bucket_index_sets,
            )?;
            bucket_layer.coordinate_buckets.push(CoordinateBucket {
                bounding_box: bounds,
                coordinates: cell.coordinates,
                quad_vertices: Vec::new(),
            });
        }
        if !cell.quad_triangles.is_empty() {
            let bucket = bucket_layer.coordinate_buckets.len() as u32;
            subdivide_index_set(
                bucket,
                &[],
                &cell.quad_vertices,
                Vec::new(),
                cell.quad_triangles,
                bounds,
                index_recursions,
                min_primitive_count,
                &mut bucket_layer.bucket_index_sets,
            )?;
            bucket_layer.coordinate_buckets.push(CoordinateBucket {
                bounding_box: bounds,
                coordinates: Vec::new(),
                quad_vertices: cell.quad_vertices,
            });
        }
    }

    for bucket in &mut bucket_layer.coordinate_buckets {
        rebase_bucket(bucket);
    }

    eprintln!(
        "Bucketized layer into {} buckets / {} index sets ({} empty cells skipped, {} cells re-subdivided)",
        bucket_layer.coordinate_buckets.len(),
        bucket_layer.bucket_index_sets.len(),
        empty_cells,
        overflowed_cells
    );

    Ok(bucket_layer)
}
