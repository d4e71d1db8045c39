//! Indexed triangle meshes: validation, primitives, and OBJ loading.

use std::f32::consts::TAU;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::error::{GeometryError, GeometryResult};

/// Segments around the circumference of generated round primitives.
pub const DEFAULT_SEGMENTS: usize = 32;

/// An indexed triangle mesh expressed in its object-local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    vertices: Vec<Point3<f32>>,
    faces: Vec<[u32; 3]>,
}

impl TriMesh {
    /// Build a mesh, checking that it is non-empty and every face index is valid.
    pub fn new(vertices: Vec<Point3<f32>>, faces: Vec<[u32; 3]>) -> GeometryResult<Self> {
        if vertices.is_empty() || faces.is_empty() {
            return Err(GeometryError::EmptyMesh);
        }
        let vertex_count = vertices.len();
        for (face, tri) in faces.iter().enumerate() {
            for &index in tri {
                let index = index as usize;
                if index >= vertex_count {
                    return Err(GeometryError::IndexOutOfBounds {
                        face,
                        index,
                        vertex_count,
                    });
                }
            }
        }
        Ok(Self { vertices, faces })
    }

    pub fn vertices(&self) -> &[Point3<f32>] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Corner positions of face `i`.
    pub fn triangle(&self, i: usize) -> [Point3<f32>; 3] {
        let [a, b, c] = self.faces[i];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    pub fn triangle_area(&self, i: usize) -> f32 {
        let [a, b, c] = self.triangle(i);
        0.5 * (b - a).cross(&(c - a)).norm()
    }

    pub fn surface_area(&self) -> f32 {
        (0..self.faces.len()).map(|i| self.triangle_area(i)).sum()
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        let mut min = self.vertices[0];
        let mut max = self.vertices[0];
        for v in &self.vertices[1..] {
            min = min.inf(v);
            max = max.sup(v);
        }
        (min, max)
    }

    // -----------------------------------------------------------------------
    // Primitives
    // -----------------------------------------------------------------------

    /// Closed cylinder along +z with its origin at the center of the bottom cap.
    pub fn cylinder(radius: f32, height: f32, segments: usize) -> GeometryResult<Self> {
        check_dimension("radius", radius)?;
        check_dimension("height", height)?;
        let segments = segments.max(3);
        let mut builder = MeshBuilder::default();
        let bottom = builder.ring(radius, 0.0, segments);
        let top = builder.ring(radius, height, segments);
        builder.strip(bottom, top, segments);
        builder.cap(bottom, 0.0, segments, true);
        builder.cap(top, height, segments, false);
        builder.build()
    }

    /// Socket with a blind round hole, origin at the center of the hole floor.
    ///
    /// The hole walls run from `z = 0` to `z = depth`; the solid body extends
    /// `floor` below the origin and `outer_radius` out from the axis.
    pub fn socket(
        hole_radius: f32,
        outer_radius: f32,
        depth: f32,
        floor: f32,
        segments: usize,
    ) -> GeometryResult<Self> {
        check_dimension("hole_radius", hole_radius)?;
        check_dimension("depth", depth)?;
        check_dimension("floor", floor)?;
        if outer_radius <= hole_radius {
            return Err(GeometryError::InvalidDimension {
                name: "outer_radius",
                value: outer_radius,
            });
        }
        let segments = segments.max(3);
        let mut builder = MeshBuilder::default();
        let inner_floor = builder.ring(hole_radius, 0.0, segments);
        let inner_top = builder.ring(hole_radius, depth, segments);
        let outer_top = builder.ring(outer_radius, depth, segments);
        let outer_bottom = builder.ring(outer_radius, -floor, segments);
        builder.strip(inner_top, inner_floor, segments);
        builder.strip(outer_top, inner_top, segments);
        builder.strip(outer_bottom, outer_top, segments);
        builder.cap(inner_floor, 0.0, segments, false);
        builder.cap(outer_bottom, -floor, segments, true);
        builder.build()
    }

    // -----------------------------------------------------------------------
    // Wavefront OBJ
    // -----------------------------------------------------------------------

    /// Parse `v` and `f` records from Wavefront OBJ text.
    ///
    /// Polygons are fan-triangulated. Face indices may carry `/vt/vn`
    /// suffixes and may be negative (relative to the last vertex).
    pub fn from_obj_str(content: &str) -> GeometryResult<Self> {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        for (line_idx, raw) in content.lines().enumerate() {
            let line_num = line_idx + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some("v") => {
                    let coords: Vec<f32> = parts
                        .take(3)
                        .map(str::parse)
                        .collect::<Result<_, _>>()
                        .map_err(|e| parse_error(line_num, format!("invalid coordinate: {e}")))?;
                    if coords.len() != 3 {
                        return Err(parse_error(line_num, "expected 3 coordinates"));
                    }
                    vertices.push(Point3::new(coords[0], coords[1], coords[2]));
                }
                Some("f") => {
                    let indices = parts
                        .map(|token| resolve_index(token, vertices.len(), line_num))
                        .collect::<GeometryResult<Vec<u32>>>()?;
                    if indices.len() < 3 {
                        return Err(parse_error(line_num, "face needs at least 3 vertices"));
                    }
                    for k in 1..indices.len() - 1 {
                        faces.push([indices[0], indices[k], indices[k + 1]]);
                    }
                }
                _ => {}
            }
        }

        let mesh = Self::new(vertices, faces)?;
        debug!(
            vertices = mesh.vertices.len(),
            faces = mesh.faces.len(),
            "parsed OBJ mesh"
        );
        Ok(mesh)
    }

    pub fn from_obj_file(path: impl AsRef<Path>) -> GeometryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_obj_str(&content)
    }

    /// Translate every vertex by `offset`.
    #[must_use]
    pub fn translated(mut self, offset: Vector3<f32>) -> Self {
        for v in &mut self.vertices {
            *v += offset;
        }
        self
    }
}

fn check_dimension(name: &'static str, value: f32) -> GeometryResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidDimension { name, value })
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> GeometryError {
    GeometryError::Parse {
        line,
        message: message.into(),
    }
}

fn resolve_index(token: &str, vertex_count: usize, line: usize) -> GeometryResult<u32> {
    let head = token.split('/').next().unwrap_or("");
    let raw: i64 = head
        .parse()
        .map_err(|_| parse_error(line, format!("invalid face index '{token}'")))?;
    let count = i64::try_from(vertex_count).unwrap_or(i64::MAX);
    let resolved = match raw {
        0 => return Err(parse_error(line, "face index 0 is not valid")),
        r if r > 0 => r - 1,
        r => count + r,
    };
    if resolved < 0 || resolved >= count {
        return Err(parse_error(
            line,
            format!("face index {raw} out of range ({vertex_count} vertices so far)"),
        ));
    }
    u32::try_from(resolved).map_err(|_| parse_error(line, "face index exceeds u32"))
}

// ---------------------------------------------------------------------------
// MeshBuilder
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<Point3<f32>>,
    faces: Vec<[u32; 3]>,
}

impl MeshBuilder {
    #[allow(clippy::cast_precision_loss)]
    fn ring(&mut self, radius: f32, z: f32, segments: usize) -> u32 {
        let start = self.index();
        for k in 0..segments {
            let theta = TAU * k as f32 / segments as f32;
            self.vertices
                .push(Point3::new(radius * theta.cos(), radius * theta.sin(), z));
        }
        start
    }

    /// Quad strip between two rings of equal segment count.
    #[allow(clippy::cast_possible_truncation)]
    fn strip(&mut self, a: u32, b: u32, segments: usize) {
        let n = segments as u32;
        for k in 0..n {
            let next = (k + 1) % n;
            self.faces.push([a + k, a + next, b + next]);
            self.faces.push([a + k, b + next, b + k]);
        }
    }

    /// Triangle fan closing a ring with a center vertex.
    #[allow(clippy::cast_possible_truncation)]
    fn cap(&mut self, ring: u32, z: f32, segments: usize, facing_down: bool) {
        let center = self.index();
        self.vertices.push(Point3::new(0.0, 0.0, z));
        let n = segments as u32;
        for k in 0..n {
            let next = (k + 1) % n;
            if facing_down {
                self.faces.push([center, ring + next, ring + k]);
            } else {
                self.faces.push([center, ring + k, ring + next]);
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn index(&self) -> u32 {
        self.vertices.len() as u32
    }

    fn build(self) -> GeometryResult<TriMesh> {
        TriMesh::new(self.vertices, self.faces)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
