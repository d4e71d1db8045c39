//! Nearest-surface distance queries against a triangle mesh.

use nalgebra::{Point3, Vector3};

use crate::mesh::TriMesh;

/// Closest point on a triangle to a query point.
///
/// Voronoi-region walk from "Real-Time Collision Detection" (Ericson).
#[must_use]
pub fn closest_point_on_triangle(
    point: &Point3<f32>,
    v0: &Point3<f32>,
    v1: &Point3<f32>,
    v2: &Point3<f32>,
) -> Point3<f32> {
    let ab = v1 - v0;
    let ac = v2 - v0;
    let ap = point - v0;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *v0;
    }

    let bp = point - v1;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *v1;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return v0 + ab * v;
    }

    let cp = point - v2;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *v2;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return v0 + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return v1 + (v2 - v1) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    v0 + ab * v + ac * w
}

/// Squared distance from `p` to an axis-aligned box; zero inside.
fn aabb_distance_squared(p: &Point3<f32>, min: &Point3<f32>, max: &Point3<f32>) -> f32 {
    let mut d = 0.0;
    for i in 0..3 {
        let excess = if p[i] < min[i] {
            min[i] - p[i]
        } else if p[i] > max[i] {
            p[i] - max[i]
        } else {
            0.0
        };
        d += excess * excess;
    }
    d
}

// ---------------------------------------------------------------------------
// ProximityQuery
// ---------------------------------------------------------------------------

/// Unsigned distance to the surface of a mesh in its local frame.
///
/// Brute force over faces, pruned by per-face bounding boxes.
#[derive(Debug, Clone)]
pub struct ProximityQuery {
    triangles: Vec<[Point3<f32>; 3]>,
    boxes: Vec<(Point3<f32>, Point3<f32>)>,
}

impl ProximityQuery {
    pub fn new(mesh: &TriMesh) -> Self {
        let triangles: Vec<_> = (0..mesh.face_count()).map(|i| mesh.triangle(i)).collect();
        let boxes = triangles
            .iter()
            .map(|[a, b, c]| (a.inf(b).inf(c), a.sup(b).sup(c)))
            .collect();
        Self { triangles, boxes }
    }

    /// Nearest surface point and its distance.
    pub fn closest_point(&self, point: &Point3<f32>) -> (Point3<f32>, f32) {
        let mut best_sq = f32::INFINITY;
        let mut best = *point;
        for (tri, (min, max)) in self.triangles.iter().zip(&self.boxes) {
            if aabb_distance_squared(point, min, max) >= best_sq {
                continue;
            }
            let candidate = closest_point_on_triangle(point, &tri[0], &tri[1], &tri[2]);
            let d_sq = (candidate - point).norm_squared();
            if d_sq < best_sq {
                best_sq = d_sq;
                best = candidate;
            }
        }
        (best, best_sq.sqrt())
    }

    pub fn distance(&self, point: &Point3<f32>) -> f32 {
        self.closest_point(point).1
    }

    pub fn distance_to(&self, point: &Vector3<f32>) -> f32 {
        self.distance(&Point3::from(*point))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn unit_triangle() -> [Point3<f32>; 3] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn closest_point_face_region() {
        let [a, b, c] = unit_triangle();
        let p = Point3::new(0.25, 0.25, 1.0);
        let q = closest_point_on_triangle(&p, &a, &b, &c);
        assert_relative_eq!(q, Point3::new(0.25, 0.25, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn closest_point_vertex_region() {
        let [a, b, c] = unit_triangle();
        let p = Point3::new(-1.0, -1.0, 0.0);
        assert_eq!(closest_point_on_triangle(&p, &a, &b, &c), a);
    }

    #[test]
    fn closest_point_edge_region() {
        let [a, b, c] = unit_triangle();
        let p = Point3::new(1.0, 1.0, 0.0);
        let q = closest_point_on_triangle(&p, &a, &b, &c);
        assert_relative_eq!(q, Point3::new(0.5, 0.5, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn cylinder_distance_from_axis_and_outside() {
        let mesh = TriMesh::cylinder(0.5, 2.0, 64).unwrap();
        let query = ProximityQuery::new(&mesh);
        // Inside, on the axis at mid-height: distance to the wall.
        let inside = query.distance(&Point3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(inside, 0.5, max_relative = 1e-2);
        // Above the top cap.
        let above = query.distance(&Point3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(above, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn point_on_surface_has_zero_distance() {
        let mesh = TriMesh::cylinder(0.5, 2.0, 16).unwrap();
        let query = ProximityQuery::new(&mesh);
        let v = mesh.vertices()[3];
        assert!(query.distance(&v) < 1e-6);
    }

    proptest! {
        #[test]
        fn pruned_query_matches_brute_force(
            x in -2.0f32..2.0,
            y in -2.0f32..2.0,
            z in -1.0f32..3.0,
        ) {
            let mesh = TriMesh::socket(0.3, 0.6, 1.5, 0.2, 12).unwrap();
            let query = ProximityQuery::new(&mesh);
            let p = Point3::new(x, y, z);
            let brute = (0..mesh.face_count())
                .map(|i| {
                    let [a, b, c] = mesh.triangle(i);
                    (closest_point_on_triangle(&p, &a, &b, &c) - p).norm()
                })
                .fold(f32::INFINITY, f32::min);
            prop_assert!((query.distance(&p) - brute).abs() < 1e-5);
        }
    }
}
