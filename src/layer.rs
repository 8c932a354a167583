//! Layer compilation driver
//!
//! A map layer arrives from the importer as index-based source geometry
//! (polygons, multipolygons, road linestrips) and leaves as renderable
//! triangles, optionally bucketized. Each compilation step is a
//! [`LayerOperation`]; the driver applies them in order and reports what
//! it did. Failures inside a polygon batch are local: the offending
//! polygon is skipped and counted, the batch continues.

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;

use crate::bucketing::bucketize_layer;
use crate::debug::DebugLines;
use crate::geometry::{BoundingBox2D, BucketMapLayer, MapLayer, Triangle};
use crate::tessellation::{
    convert_linestrips, triangulate_multipolygon, triangulate_polygon, RibbonParams, RibbonStats,
};

/// One step of a layer compilation job.
#[derive(Debug, Clone)]
pub enum LayerOperation {
    /// Triangulate every polygon and multipolygon of the layer into the
    /// shared triangle list, consuming the ring primitives.
    TriangulatePolygons,
    /// Drop every linestrip with a functional road class above the
    /// threshold, so minor roads can be excluded from coarse layers.
    FilterLinestrips { max_func_class: i32 },
    /// Convert the layer's road linestrips into ribbon geometry,
    /// replacing the layer's coordinates and triangles.
    TriangulateRibbons(RibbonParams),
    /// Split the compiled layer into coordinate buckets and subdivided
    /// index sets.
    Bucketize {
        bucket_recursions: u32,
        index_recursions: u32,
        min_primitive_count: usize,
    },
}

/// Counters reported by [`compile_layer`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CompileStats {
    pub polygons_triangulated: usize,
    pub polygons_skipped: usize,
    pub ribbons: RibbonStats,
}

/// Recomputes the layer bounding box from its current vertex data.
pub fn recompute_bounds(layer: &mut MapLayer) {
    let mut points = layer
        .coordinates
        .iter()
        .map(|v| v.position.xy())
        .chain(layer.quad_vertices.iter().map(|q| q.origin));
    let Some(first) = points.next() else {
        layer.bounding_box = BoundingBox2D::default();
        return;
    };
    let mut bounds = BoundingBox2D::from_point(first);
    for p in points {
        bounds.min.x = bounds.min.x.min(p.x);
        bounds.min.y = bounds.min.y.min(p.y);
        bounds.max.x = bounds.max.x.max(p.x);
        bounds.max.y = bounds.max.y.max(p.y);
    }
    layer.bounding_box = bounds;
}

/// Triangulates all polygon and multipolygon primitives of a layer in
/// parallel. Degenerate rings are skipped and counted; everything else
/// lands in the layer's triangle list and the ring primitives are
/// consumed.
pub fn triangulate_layer_polygons(layer: &mut MapLayer) -> CompileStats {
    let mut stats = CompileStats::default();
    let coordinates = &layer.coordinates;

    let polygon_batches: Vec<Result<Vec<Triangle>>> = layer
        .index_set
        .polygons
        .par_iter()
        .map(|polygon| {
            let mut triangles = Vec::new();
            triangulate_polygon(coordinates, polygon, &mut triangles)?;
            Ok(triangles)
        })
        .collect();
    let multipolygon_batches: Vec<Result<Vec<Triangle>>> = layer
        .index_set
        .multipolygons
        .par_iter()
        .map(|multipolygon| {
            let mut triangles = Vec::new();
            triangulate_multipolygon(coordinates, multipolygon, &mut triangles)?;
            Ok(triangles)
        })
        .collect();

    for batch in polygon_batches.into_iter().chain(multipolygon_batches) {
        match batch {
            Ok(triangles) => {
                stats.polygons_triangulated += 1;
                layer.index_set.triangles.extend(triangles);
            }
            Err(error) => {
                stats.polygons_skipped += 1;
                eprintln!("Skipping polygon: {error}");
            }
        }
    }

    layer.index_set.polygons.clear();
    layer.index_set.multipolygons.clear();
    stats
}

/// Converts the layer's linestrips into merged ribbon geometry. The
/// layer's coordinates and triangles are replaced; the consumed
/// linestrips are cleared and the bounding box is recomputed, since caps
/// and miters can extend past the source extents.
pub fn triangulate_layer_ribbons(
    layer: &mut MapLayer,
    params: &RibbonParams,
    debug: Option<&mut DebugLines>,
) -> RibbonStats {
    let (coordinates, triangles, stats) =
        convert_linestrips(&layer.coordinates, &layer.index_set.linestrips, params, debug);
    layer.coordinates = coordinates;
    layer.index_set.triangles = triangles;
    layer.index_set.linestrips.clear();
    recompute_bounds(layer);
    stats
}

/// Applies a sequence of compilation operations to a layer in place.
/// Returns the bucketized layer if a [`LayerOperation::Bucketize`] step
/// ran, together with the accumulated counters.
pub fn compile_layer(
    layer: &mut MapLayer,
    operations: &[LayerOperation],
    mut debug: Option<&mut DebugLines>,
) -> Result<(Option<BucketMapLayer>, CompileStats)> {
    let mut stats = CompileStats::default();
    let mut bucketized = None;

    for operation in operations {
        match operation {
            LayerOperation::TriangulatePolygons => {
                let batch = triangulate_layer_polygons(layer);
                stats.polygons_triangulated += batch.polygons_triangulated;
                stats.polygons_skipped += batch.polygons_skipped;
            }
            LayerOperation::FilterLinestrips { max_func_class } => {
                let before = layer.index_set.linestrips.len();
                layer
                    .index_set
                    .linestrips
                    .retain(|l| l.func_class <= *max_func_class);
                eprintln!(
                    "Filtered {} linestrips above functional class {}",
                    before - layer.index_set.linestrips.len(),
                    max_func_class
                );
            }
            LayerOperation::TriangulateRibbons(params) => {
                stats.ribbons = triangulate_layer_ribbons(layer, params, debug.as_deref_mut());
            }
            LayerOperation::Bucketize {
                bucket_recursions,
                index_recursions,
                min_primitive_count,
            } => {
                bucketized = Some(bucketize_layer(
                    layer,
                    *bucket_recursions,
                    *index_recursions,
                    *min_primitive_count,
                )?);
            }
        }
    }

    Ok((bucketized, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Linestrip, Mat3, Polygon, Vec3, Vertex};

    fn vertex(x: f32, y: f32) -> Vertex {
        Vertex {
            position: Vec3::new(x, y, 0.0),
            ..Default::default()
        }
    }

    fn square_layer() -> MapLayer {
        let mut layer = MapLayer::default();
        layer.coordinates = vec![
            vertex(0.0, 0.0),
            vertex(4.0, 0.0),
            vertex(4.0, 4.0),
            vertex(0.0, 4.0),
        ];
        layer.index_set.polygons.push(Polygon {
            indices: vec![0, 1, 2, 3],
        });
        recompute_bounds(&mut layer);
        layer
    }

    #[test]
    fn test_polygon_pass_consumes_rings() {
        let mut layer = square_layer();
        let stats = triangulate_layer_polygons(&mut layer);
        assert_eq!(stats.polygons_triangulated, 1);
        assert_eq!(stats.polygons_skipped, 0);
        assert!(layer.index_set.polygons.is_empty());
        assert_eq!(layer.index_set.triangles.len(), 2);
    }

    #[test]
    fn test_degenerate_polygon_is_skipped_not_fatal() {
        let mut layer = square_layer();
        // Collinear ring alongside the valid square
        layer.coordinates.extend([
            vertex(10.0, 0.0),
            vertex(11.0, 0.0),
            vertex(12.0, 0.0),
        ]);
        layer.index_set.polygons.push(Polygon {
            indices: vec![4, 5, 6],
        });

        let stats = triangulate_layer_polygons(&mut layer);
        assert_eq!(stats.polygons_triangulated, 1);
        assert_eq!(stats.polygons_skipped, 1);
        assert_eq!(layer.index_set.triangles.len(), 2);
    }

    #[test]
    fn test_ribbon_pass_replaces_geometry_and_bounds() {
        let mut layer = MapLayer::default();
        layer.coordinates = vec![vertex(0.0, 0.0), vertex(10.0, 0.0)];
        layer.index_set.linestrips.push(Linestrip {
            start_id: 1,
            end_id: 2,
            func_class: 0,
            indices: vec![0, 1],
        });
        recompute_bounds(&mut layer);

        let params = RibbonParams {
            width: 1.0,
            texture_matrix: Mat3::IDENTITY,
            triangulate_caps: false,
            triangulate_intersections: false,
        };
        let stats = triangulate_layer_ribbons(&mut layer, &params, None);
        assert_eq!(stats.dead_ends, 2);
        assert!(layer.index_set.linestrips.is_empty());
        assert_eq!(layer.index_set.triangles.len(), 2);
        // Rails extend the bounds by one width on each side of the line
        assert!((layer.bounding_box.min.y + 1.0).abs() < 1e-5);
        assert!((layer.bounding_box.max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_func_class_filter() {
        let mut layer = MapLayer::default();
        layer.coordinates = vec![vertex(0.0, 0.0), vertex(10.0, 0.0)];
        for func_class in [0, 2, 5] {
            layer.index_set.linestrips.push(Linestrip {
                start_id: 1,
                end_id: 2,
                func_class,
                indices: vec![0, 1],
            });
        }
        let operations = [LayerOperation::FilterLinestrips { max_func_class: 2 }];
        compile_layer(&mut layer, &operations, None).unwrap();
        assert_eq!(layer.index_set.linestrips.len(), 2);
        assert!(layer.index_set.linestrips.iter().all(|l| l.func_class <= 2));
    }

    #[test]
    fn test_compile_sequence_through_bucketize() {
        let mut layer = square_layer();
        let operations = [
            LayerOperation::TriangulatePolygons,
            LayerOperation::Bucketize {
                bucket_recursions: 0,
                index_recursions: 0,
                min_primitive_count: 0,
            },
        ];
        let (bucketized, stats) = compile_layer(&mut layer, &operations, None).unwrap();
        assert_eq!(stats.polygons_triangulated, 1);
        let bucketized = bucketized.unwrap();
        assert!(!bucketized.coordinate_buckets.is_empty());
        let total: usize = bucketized
            .bucket_index_sets
            .iter()
            .map(|set| set.index_set.primitive_count())
            .sum();
        assert!(total >= 2);
    }
}
