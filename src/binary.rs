//! Binary layer file format
//!
//! Little-endian serialization of [`MapLayer`] (the importer/compiler
//! interchange format) and [`BucketMapLayer`] (the renderer-facing
//! result). The stream starts with a version word; a fixed checkpoint
//! word is written after every section so a reader detects truncated or
//! desynchronized files at the section where it happened instead of
//! producing garbage geometry.
//!
//! The index set is prefixed with a content bitmask; absent primitive
//! kinds occupy no bytes.

use std::io::{Read, Write};

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::geometry::{
    BoundingBox2D, BucketIndexSet, BucketMapLayer, CompactTriangle, CoordinateBucket, IndexSet,
    Linestrip, MapLayer, MultiPolygon, Polygon, QuadVertex, RenderIndexSet, Sign, Text, Triangle,
    Vec2, Vec3, Vertex,
};

/// Version word written at the start of every layer file.
pub const LAYER_FORMAT_VERSION: u32 = 1;

/// Section marker. Chosen to be recognizable in a hex dump.
const CHECKPOINT: u32 = 0xFACE_BEED;

// Index set content bitmask
const CONTENT_LINESTRIPS: u32 = 1 << 0;
const CONTENT_POLYGONS: u32 = 1 << 1;
const CONTENT_MULTIPOLYGONS: u32 = 1 << 2;
const CONTENT_TRIANGLES: u32 = 1 << 3;
const CONTENT_POINTS: u32 = 1 << 4;
const CONTENT_SIGNS: u32 = 1 << 5;
const CONTENT_TEXTS: u32 = 1 << 6;
const CONTENT_QUAD_TRIANGLES: u32 = 1 << 7;

fn write_checkpoint<W: Write>(w: &mut W) -> Result<()> {
    w.write_u32::<LittleEndian>(CHECKPOINT)?;
    Ok(())
}

fn expect_checkpoint<R: Read>(r: &mut R, section: &str) -> Result<()> {
    let word = r
        .read_u32::<LittleEndian>()
        .with_context(|| format!("file ends before the {section} checkpoint"))?;
    if word != CHECKPOINT {
        bail!("checkpoint mismatch after {section} section (read {word:#010x})");
    }
    Ok(())
}

fn write_count<W: Write>(w: &mut W, count: usize) -> Result<()> {
    w.write_u32::<LittleEndian>(u32::try_from(count)?)?;
    Ok(())
}

fn read_count<R: Read>(r: &mut R) -> Result<usize> {
    Ok(r.read_u32::<LittleEndian>()? as usize)
}

fn write_vec2<W: Write>(w: &mut W, v: Vec2) -> Result<()> {
    w.write_f32::<LittleEndian>(v.x)?;
    w.write_f32::<LittleEndian>(v.y)?;
    Ok(())
}

fn read_vec2<R: Read>(r: &mut R) -> Result<Vec2> {
    Ok(Vec2::new(
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
    ))
}

fn write_bounds<W: Write>(w: &mut W, bounds: &BoundingBox2D) -> Result<()> {
    write_vec2(w, bounds.min)?;
    write_vec2(w, bounds.max)
}

fn read_bounds<R: Read>(r: &mut R) -> Result<BoundingBox2D> {
    Ok(BoundingBox2D::new(read_vec2(r)?, read_vec2(r)?))
}

fn write_vertex<W: Write>(w: &mut W, vertex: &Vertex) -> Result<()> {
    w.write_f32::<LittleEndian>(vertex.position.x)?;
    w.write_f32::<LittleEndian>(vertex.position.y)?;
    w.write_f32::<LittleEndian>(vertex.position.z)?;
    write_vec2(w, vertex.texcoord)
}

fn read_vertex<R: Read>(r: &mut R) -> Result<Vertex> {
    let position = Vec3::new(
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
    );
    Ok(Vertex {
        position,
        texcoord: read_vec2(r)?,
    })
}

fn write_quad_vertex<W: Write>(w: &mut W, quad: &QuadVertex) -> Result<()> {
    write_vec2(w, quad.origin)?;
    w.write_i8(quad.word_index)?;
    w.write_i8(quad.height_index)?;
    w.write_u8(quad.u)?;
    w.write_u8(quad.v)?;
    Ok(())
}

fn read_quad_vertex<R: Read>(r: &mut R) -> Result<QuadVertex> {
    Ok(QuadVertex {
        origin: read_vec2(r)?,
        word_index: r.read_i8()?,
        height_index: r.read_i8()?,
        u: r.read_u8()?,
        v: r.read_u8()?,
    })
}

fn write_indices<W: Write>(w: &mut W, indices: &[u32]) -> Result<()> {
    write_count(w, indices.len())?;
    for &index in indices {
        w.write_u32::<LittleEndian>(index)?;
    }
    Ok(())
}

fn read_indices<R: Read>(r: &mut R) -> Result<Vec<u32>> {
    let count = read_count(r)?;
    let mut indices = Vec::with_capacity(count);
    for _ in 0..count {
        indices.push(r.read_u32::<LittleEndian>()?);
    }
    Ok(indices)
}

fn write_triangles<W: Write>(w: &mut W, triangles: &[Triangle]) -> Result<()> {
    write_count(w, triangles.len())?;
    for t in triangles {
        w.write_u32::<LittleEndian>(t.a)?;
        w.write_u32::<LittleEndian>(t.b)?;
        w.write_u32::<LittleEndian>(t.c)?;
    }
    Ok(())
}

fn read_triangles<R: Read>(r: &mut R) -> Result<Vec<Triangle>> {
    let count = read_count(r)?;
    let mut triangles = Vec::with_capacity(count);
    for _ in 0..count {
        triangles.push(Triangle::new(
            r.read_u32::<LittleEndian>()?,
            r.read_u32::<LittleEndian>()?,
            r.read_u32::<LittleEndian>()?,
        ));
    }
    Ok(triangles)
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    write_count(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = read_count(r)?;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    Ok(String::from_utf8(bytes)?)
}

fn index_set_content(set: &IndexSet) -> u32 {
    let mut mask = 0;
    if !set.linestrips.is_empty() {
        mask |= CONTENT_LINESTRIPS;
    }
    if !set.polygons.is_empty() {
        mask |= CONTENT_POLYGONS;
    }
    if !set.multipolygons.is_empty() {
        mask |= CONTENT_MULTIPOLYGONS;
    }
    if !set.triangles.is_empty() {
        mask |= CONTENT_TRIANGLES;
    }
    if !set.points.is_empty() {
        mask |= CONTENT_POINTS;
    }
    if !set.signs.is_empty() {
        mask |= CONTENT_SIGNS;
    }
    if !set.texts.is_empty() {
        mask |= CONTENT_TEXTS;
    }
    if !set.quad_triangles.is_empty() {
        mask |= CONTENT_QUAD_TRIANGLES;
    }
    mask
}

fn write_index_set<W: Write>(w: &mut W, set: &IndexSet) -> Result<()> {
    w.write_u32::<LittleEndian>(index_set_content(set))?;

    if !set.linestrips.is_empty() {
        write_count(w, set.linestrips.len())?;
        for linestrip in &set.linestrips {
            w.write_i32::<LittleEndian>(linestrip.start_id)?;
            w.write_i32::<LittleEndian>(linestrip.end_id)?;
            w.write_i32::<LittleEndian>(linestrip.func_class)?;
            write_indices(w, &linestrip.indices)?;
        }
    }
    if !set.polygons.is_empty() {
        write_count(w, set.polygons.len())?;
        for polygon in &set.polygons {
            write_indices(w, &polygon.indices)?;
        }
    }
    if !set.multipolygons.is_empty() {
        write_count(w, set.multipolygons.len())?;
        for multipolygon in &set.multipolygons {
            write_count(w, multipolygon.polygons.len())?;
            for polygon in &multipolygon.polygons {
                write_indices(w, &polygon.indices)?;
            }
        }
    }
    if !set.triangles.is_empty() {
        write_triangles(w, &set.triangles)?;
    }
    if !set.points.is_empty() {
        write_indices(w, &set.points)?;
    }
    if !set.signs.is_empty() {
        write_count(w, set.signs.len())?;
        for sign in &set.signs {
            write_vec2(w, sign.position)?;
            write_string(w, &sign.name)?;
        }
    }
    if !set.texts.is_empty() {
        write_count(w, set.texts.len())?;
        for text in &set.texts {
            w.write_u32::<LittleEndian>(text.linestrip)?;
            write_string(w, &text.name)?;
        }
    }
    if !set.quad_triangles.is_empty() {
        write_triangles(w, &set.quad_triangles)?;
    }
    Ok(())
}

fn read_index_set<R: Read>(r: &mut R) -> Result<IndexSet> {
    let mask = r.read_u32::<LittleEndian>()?;
    let mut set = IndexSet::default();

    if mask & CONTENT_LINESTRIPS != 0 {
        let count = read_count(r)?;
        for _ in 0..count {
            set.linestrips.push(Linestrip {
                start_id: r.read_i32::<LittleEndian>()?,
                end_id: r.read_i32::<LittleEndian>()?,
                func_class: r.read_i32::<LittleEndian>()?,
                indices: read_indices(r)?,
            });
        }
    }
    if mask & CONTENT_POLYGONS != 0 {
        let count = read_count(r)?;
        for _ in 0..count {
            set.polygons.push(Polygon {
                indices: read_indices(r)?,
            });
        }
    }
    if mask & CONTENT_MULTIPOLYGONS != 0 {
        let count = read_count(r)?;
        for _ in 0..count {
            let rings = read_count(r)?;
            let mut multipolygon = MultiPolygon::default();
            for _ in 0..rings {
                multipolygon.polygons.push(Polygon {
                    indices: read_indices(r)?,
                });
            }
            set.multipolygons.push(multipolygon);
        }
    }
    if mask & CONTENT_TRIANGLES != 0 {
        set.triangles = read_triangles(r)?;
    }
    if mask & CONTENT_POINTS != 0 {
        set.points = read_indices(r)?;
    }
    if mask & CONTENT_SIGNS != 0 {
        let count = read_count(r)?;
        for _ in 0..count {
            set.signs.push(Sign {
                position: read_vec2(r)?,
                name: read_string(r)?,
            });
        }
    }
    if mask & CONTENT_TEXTS != 0 {
        let count = read_count(r)?;
        for _ in 0..count {
            set.texts.push(Text {
                linestrip: r.read_u32::<LittleEndian>()?,
                name: read_string(r)?,
            });
        }
    }
    if mask & CONTENT_QUAD_TRIANGLES != 0 {
        set.quad_triangles = read_triangles(r)?;
    }
    Ok(set)
}

/// Writes a map layer to the binary layer format.
pub fn write_map_layer<W: Write>(w: &mut W, layer: &MapLayer) -> Result<()> {
    w.write_u32::<LittleEndian>(LAYER_FORMAT_VERSION)?;
    write_bounds(w, &layer.bounding_box)?;
    write_checkpoint(w)?;

    write_count(w, layer.coordinates.len())?;
    for vertex in &layer.coordinates {
        write_vertex(w, vertex)?;
    }
    write_checkpoint(w)?;

    write_count(w, layer.quad_vertices.len())?;
    for quad in &layer.quad_vertices {
        write_quad_vertex(w, quad)?;
    }
    write_checkpoint(w)?;

    write_index_set(w, &layer.index_set)?;
    write_checkpoint(w)?;
    Ok(())
}

/// Reads a map layer from the binary layer format.
pub fn read_map_layer<R: Read>(r: &mut R) -> Result<MapLayer> {
    let version = r.read_u32::<LittleEndian>()?;
    if version != LAYER_FORMAT_VERSION {
        bail!("unsupported layer format version {version}");
    }
    let bounding_box = read_bounds(r)?;
    expect_checkpoint(r, "header")?;

    let count = read_count(r)?;
    let mut coordinates = Vec::with_capacity(count);
    for _ in 0..count {
        coordinates.push(read_vertex(r)?);
    }
    expect_checkpoint(r, "coordinates")?;

    let count = read_count(r)?;
    let mut quad_vertices = Vec::with_capacity(count);
    for _ in 0..count {
        quad_vertices.push(read_quad_vertex(r)?);
    }
    expect_checkpoint(r, "quad vertices")?;

    let index_set = read_index_set(r)?;
    expect_checkpoint(r, "index set")?;

    Ok(MapLayer {
        bounding_box,
        coordinates,
        quad_vertices,
        index_set,
    })
}

fn write_compact_triangles<W: Write>(w: &mut W, triangles: &[CompactTriangle]) -> Result<()> {
    write_count(w, triangles.len())?;
    for t in triangles {
        w.write_u16::<LittleEndian>(t.a.raw())?;
        w.write_u16::<LittleEndian>(t.b.raw())?;
        w.write_u16::<LittleEndian>(t.c.raw())?;
    }
    Ok(())
}

fn read_compact_triangles<R: Read>(r: &mut R) -> Result<Vec<CompactTriangle>> {
    let count = read_count(r)?;
    let mut triangles = Vec::with_capacity(count);
    for _ in 0..count {
        triangles.push(CompactTriangle::new(
            r.read_u16::<LittleEndian>()? as usize,
            r.read_u16::<LittleEndian>()? as usize,
            r.read_u16::<LittleEndian>()? as usize,
        )?);
    }
    Ok(triangles)
}

/// Writes a bucketized layer to the binary layer format.
pub fn write_bucket_layer<W: Write>(w: &mut W, layer: &BucketMapLayer) -> Result<()> {
    w.write_u32::<LittleEndian>(LAYER_FORMAT_VERSION)?;
    write_bounds(w, &layer.bounding_box)?;
    write_checkpoint(w)?;

    write_count(w, layer.coordinate_buckets.len())?;
    for bucket in &layer.coordinate_buckets {
        write_bounds(w, &bucket.bounding_box)?;
        write_count(w, bucket.coordinates.len())?;
        for vertex in &bucket.coordinates {
            write_vertex(w, vertex)?;
        }
        write_count(w, bucket.quad_vertices.len())?;
        for quad in &bucket.quad_vertices {
            write_quad_vertex(w, quad)?;
        }
        write_checkpoint(w)?;
    }

    write_count(w, layer.bucket_index_sets.len())?;
    for set in &layer.bucket_index_sets {
        w.write_u32::<LittleEndian>(set.bucket)?;
        write_bounds(w, &set.bounding_box)?;
        write_compact_triangles(w, &set.index_set.triangles)?;
        write_compact_triangles(w, &set.index_set.quad_triangles)?;
        write_checkpoint(w)?;
    }
    Ok(())
}

/// Reads a bucketized layer from the binary layer format.
pub fn read_bucket_layer<R: Read>(r: &mut R) -> Result<BucketMapLayer> {
    let version = r.read_u32::<LittleEndian>()?;
    if version != LAYER_FORMAT_VERSION {
        bail!("unsupported layer format version {version}");
    }
    let bounding_box = read_bounds(r)?;
    expect_checkpoint(r, "header")?;

    let bucket_count = read_count(r)?;
    let mut coordinate_buckets = Vec::with_capacity(bucket_count);
    for _ in 0..bucket_count {
        let bucket_bounds = read_bounds(r)?;
        let count = read_count(r)?;
        let mut coordinates = Vec::with_capacity(count);
        for _ in 0..count {
            coordinates.push(read_vertex(r)?);
        }
        let count = read_count(r)?;
        let mut quad_vertices = Vec::with_capacity(count);
        for _ in 0..count {
            quad_vertices.push(read_quad_vertex(r)?);
        }
        expect_checkpoint(r, "coordinate bucket")?;
        coordinate_buckets.push(CoordinateBucket {
            bounding_box: bucket_bounds,
            coordinates,
            quad_vertices,
        });
    }

    let set_count = read_count(r)?;
    let mut bucket_index_sets = Vec::with_capacity(set_count);
    for _ in 0..set_count {
        let bucket = r.read_u32::<LittleEndian>()?;
        let set_bounds = read_bounds(r)?;
        let triangles = read_compact_triangles(r)?;
        let quad_triangles = read_compact_triangles(r)?;
        expect_checkpoint(r, "bucket index set")?;
        bucket_index_sets.push(BucketIndexSet {
            bucket,
            bounding_box: set_bounds,
            index_set: RenderIndexSet {
                triangles,
                quad_triangles,
            },
        });
    }

    Ok(BucketMapLayer {
        bounding_box,
        coordinate_buckets,
        bucket_index_sets,
    })
}
