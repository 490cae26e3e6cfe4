use super::{Aabb, GeometryError, ShapeError};
use nalgebra::{Point3, Rotation3, Vector3};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Barycentric slack so that rays through shared edges hit both triangles.
const BARYCENTRIC_EPSILON: f64 = 1e-9;
/// Crossings closer than this to the ray origin belong to the origin's own surface.
const MIN_RAY_DISTANCE: f64 = 1e-9;
/// Faces whose normal is this close to perpendicular to the ray are grazed, not crossed.
const PARALLEL_EPSILON: f64 = 1e-12;
/// Same-orientation crossings within this distance are one physical crossing.
const MERGE_EPSILON: f64 = 1e-7;
const AREA_EPSILON: f64 = 1e-14;

/// Fixed, deliberately irrational-looking direction for containment rays, so they
/// rarely run along an edge of an axis-aligned mesh.
const CONTAINMENT_RAY: [f64; 3] = [0.431_277_5, 0.577_108_3, 0.693_519_1];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub t: f64,
    pub face: usize,
    pub exiting: bool,
}

#[derive(Debug, Clone)]
struct Triangle {
    origin: Point3<f64>,
    edge1: Vector3<f64>,
    edge2: Vector3<f64>,
    face: usize,
}

impl Triangle {
    /// Möller–Trumbore intersection returning the ray parameter of the hit.
    fn intersect(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<f64> {
        let p = direction.cross(&self.edge2);
        let det = self.edge1.dot(&p);
        if det.abs() < PARALLEL_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.origin;
        let u = s.dot(&p) * inv_det;
        if !(-BARYCENTRIC_EPSILON..=1.0 + BARYCENTRIC_EPSILON).contains(&u) {
            return None;
        }
        let q = s.cross(&self.edge1);
        let v = direction.dot(&q) * inv_det;
        if v < -BARYCENTRIC_EPSILON || u + v > 1.0 + BARYCENTRIC_EPSILON {
            return None;
        }
        let t = self.edge2.dot(&q) * inv_det;
        (t > MIN_RAY_DISTANCE).then_some(t)
    }
}

/// A closed polyhedral solid with outward-facing normals.
///
/// Faces are arbitrary polygons given as vertex-index lists. Each face is
/// fan-triangulated from its first vertex, so it must be star-shaped with respect
/// to that vertex (every convex polygon is). The winding may be clockwise or
/// counter-clockwise as long as it is consistent across faces: an inward winding
/// is detected by its negative enclosed volume and flipped.
///
/// The surface must be watertight: every directed edge `a -> b` of a face is
/// matched by exactly one `b -> a` in another face. Vertices shared by adjacent
/// faces must therefore be shared by index, not just by position.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Point3<f64>>,
    faces: Vec<Vec<usize>>,
    normals: Vec<Vector3<f64>>,
    triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<Vec<usize>>) -> Result<Self, ShapeError> {
        if vertices.is_empty() {
            return Err(ShapeError::EmptyVertices);
        }
        if faces.is_empty() {
            return Err(ShapeError::EmptyFaces);
        }
        for (face_idx, face) in faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(ShapeError::TooFewVertices {
                    face: face_idx,
                    count: face.len(),
                });
            }
            if let Some(&vertex) = face.iter().find(|&&v| v >= vertices.len()) {
                return Err(ShapeError::VertexOutOfRange {
                    face: face_idx,
                    vertex,
                    vertex_count: vertices.len(),
                });
            }
        }
        check_closed(&faces)?;

        let mut mesh = Self::assemble(vertices, faces)?;
        let volume = mesh.signed_volume();
        if volume.abs() < AREA_EPSILON {
            return Err(ShapeError::ZeroVolume);
        }
        if volume < 0.0 {
            let reversed = mesh
                .faces
                .into_iter()
                .map(|face| {
                    std::iter::once(face[0])
                        .chain(face[1..].iter().rev().copied())
                        .collect()
                })
                .collect();
            mesh = Self::assemble(mesh.vertices, reversed)?;
        }
        Ok(mesh)
    }

    fn assemble(vertices: Vec<Point3<f64>>, faces: Vec<Vec<usize>>) -> Result<Self, ShapeError> {
        let mut normals = Vec::with_capacity(faces.len());
        let mut triangles = Vec::new();

        for (face_idx, face) in faces.iter().enumerate() {
            let newell = newell_normal(&vertices, face);
            if newell.norm() < AREA_EPSILON {
                return Err(ShapeError::DegenerateFace { face: face_idx });
            }
            let normal = newell.normalize();

            let anchor = vertices[face[0]];
            for window in face[1..].windows(2) {
                let edge1 = vertices[window[0]] - anchor;
                let edge2 = vertices[window[1]] - anchor;
                let tri_normal = edge1.cross(&edge2);
                if tri_normal.norm() < AREA_EPSILON {
                    continue;
                }
                if tri_normal.dot(&normal) < 0.0 {
                    return Err(ShapeError::UntriangulableFace { face: face_idx });
                }
                triangles.push(Triangle {
                    origin: anchor,
                    edge1,
                    edge2,
                    face: face_idx,
                });
            }
            normals.push(normal);
        }

        Ok(Self {
            vertices,
            faces,
            normals,
            triangles,
        })
    }

    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    pub fn face_normal(&self, face: usize) -> Option<&Vector3<f64>> {
        self.normals.get(face)
    }

    /// Returns a copy of this mesh rotated about the origin.
    pub fn transformed(&self, rotation: &Rotation3<f64>) -> Self {
        Self {
            vertices: self.vertices.iter().map(|v| rotation * v).collect(),
            faces: self.faces.clone(),
            normals: self.normals.iter().map(|n| rotation * n).collect(),
            triangles: self
                .triangles
                .iter()
                .map(|tri| Triangle {
                    origin: rotation * tri.origin,
                    edge1: rotation * tri.edge1,
                    edge2: rotation * tri.edge2,
                    face: tri.face,
                })
                .collect(),
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        let first = self.vertices[0];
        let (min, max) = self
            .vertices
            .iter()
            .fold((first, first), |(min, max), v| (min.inf(v), max.sup(v)));
        Aabb { min, max }
    }

    pub fn signed_volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|tri| {
                let a = tri.origin.coords;
                let b = a + tri.edge1;
                let c = a + tri.edge2;
                a.dot(&b.cross(&c))
            })
            .sum::<f64>()
            / 6.0
    }

    /// Per-face `n · d` products for a ray direction.
    pub fn face_dots(&self, direction: &Vector3<f64>) -> Vec<f64> {
        self.normals.iter().map(|n| n.dot(direction)).collect()
    }

    /// Every surface crossing of the ray `origin + t · direction` with `t > 0`,
    /// ordered by distance, with coincident crossings of the same orientation merged.
    ///
    /// `face_dots` must come from [`Mesh::face_dots`] for the same direction.
    pub fn crossings(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        face_dots: &[f64],
    ) -> Vec<Crossing> {
        let mut crossings: Vec<Crossing> = self
            .triangles
            .iter()
            .filter(|tri| face_dots[tri.face].abs() >= PARALLEL_EPSILON)
            .filter_map(|tri| {
                tri.intersect(origin, direction).map(|t| Crossing {
                    t,
                    face: tri.face,
                    exiting: face_dots[tri.face] > 0.0,
                })
            })
            .collect();

        crossings.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(Ordering::Equal));

        let mut merged: Vec<Crossing> = Vec::with_capacity(crossings.len());
        for crossing in crossings {
            let duplicate = merged
                .iter()
                .rev()
                .take_while(|m| crossing.t - m.t < MERGE_EPSILON)
                .any(|m| m.exiting == crossing.exiting);
            if !duplicate {
                merged.push(crossing);
            }
        }
        merged
    }

    /// Path length through the solid from `origin` along `direction`.
    ///
    /// A point outside the solid (no crossing, or an entering first crossing) has
    /// depth zero. A point lying on the surface has its own crossing swallowed by
    /// the minimum ray distance; when the ray leaves through that face the first
    /// remaining crossing is entering, and the material further along still counts
    /// as long as [`Mesh::contains`] places the point inside.
    pub fn depth(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        face_dots: &[f64],
    ) -> Result<f64, GeometryError> {
        let crossings = self.crossings(origin, direction, face_dots);
        match crossings.first() {
            None => Ok(0.0),
            Some(first) if first.exiting => parity_scan(&crossings, true),
            Some(_) if self.contains(origin) => parity_scan(&crossings, false),
            Some(_) => Ok(0.0),
        }
    }

    /// Odd-parity containment test along a fixed skewed ray.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        let direction = Vector3::from(CONTAINMENT_RAY).normalize();
        let dots = self.face_dots(&direction);
        self.crossings(point, &direction, &dots).len() % 2 == 1
    }
}

/// Parity scan over ordered crossings, starting inside the solid.
///
/// Each crossing toggles inside/outside; the lengths of inside segments are summed.
/// A scan that is still inside after the last crossing means the surface does not
/// close along this ray.
pub fn inside_path_length(crossings: &[Crossing]) -> Result<f64, GeometryError> {
    parity_scan(crossings, true)
}

fn parity_scan(crossings: &[Crossing], mut inside: bool) -> Result<f64, GeometryError> {
    let mut last_t = 0.0;
    let mut total = 0.0;
    for crossing in crossings {
        if inside {
            total += crossing.t - last_t;
        }
        inside = !inside;
        last_t = crossing.t;
    }
    if inside {
        return Err(GeometryError::UnterminatedParity {
            face: crossings.last().map(|c| c.face),
        });
    }
    Ok(total)
}

/// Every directed edge must have exactly one reversed twin.
fn check_closed(faces: &[Vec<usize>]) -> Result<(), ShapeError> {
    let mut edges: HashMap<(usize, usize), usize> = HashMap::new();
    let directed = || {
        faces
            .iter()
            .flat_map(|face| face.iter().zip(face.iter().cycle().skip(1)))
            .map(|(&a, &b)| (a, b))
    };
    for edge in directed() {
        *edges.entry(edge).or_default() += 1;
    }
    for (a, b) in directed() {
        let forward = edges.get(&(a, b)).copied().unwrap_or(0);
        let backward = edges.get(&(b, a)).copied().unwrap_or(0);
        if forward != 1 || backward != 1 {
            return Err(ShapeError::OpenSurface { from: a, to: b });
        }
    }
    Ok(())
}

fn newell_normal(vertices: &[Point3<f64>], face: &[usize]) -> Vector3<f64> {
    face.iter()
        .zip(face.iter().cycle().skip(1))
        .fold(Vector3::zeros(), |acc, (&i, &j)| {
            acc + vertices[i].coords.cross(&vertices[j].coords)
        })
        * 0.5
}
