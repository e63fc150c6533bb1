
//! Simple math utilities for points on surfaces.

use std::ops::{Add, Sub, Mul, Div, Neg};


/// Simple three-dimensional vector of 32-bit floats.
/// Supports only few mathematical operations
/// as this is used mainly as data struct.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Vec3 (pub f32, pub f32, pub f32);

impl Vec3 {

    /// The origin.
    pub const ZERO: Vec3 = Vec3(0.0, 0.0, 0.0);

    /// Maps all components of this vector to a new value.
    pub fn map(self, map: impl Fn(f32) -> f32) -> Vec3 {
        Vec3(map(self.0), map(self.1), map(self.2))
    }

    /// The sum of the component-wise products.
    pub fn dot(self, other: Vec3) -> f32 {
        self.0 * other.0 + self.1 * other.1 + self.2 * other.2
    }

    /// The vector perpendicular to both inputs.
    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3(
            self.1 * other.2 - self.2 * other.1,
            self.2 * other.0 - self.0 * other.2,
            self.0 * other.1 - self.1 * other.0,
        )
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Euclidean distance to the other point.
    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }

    /// Squared euclidean distance to the other point.
    pub fn distance_squared(self, other: Vec3) -> f32 {
        let delta = self - other;
        delta.dot(delta)
    }

    /// Components as an array, in x, y, z order.
    pub fn to_array(self) -> [f32; 3] {
        [self.0, self.1, self.2]
    }

    /// This vector scaled to length one. The zero vector stays zero.
    pub fn normalized(self) -> Vec3 {
        let length = self.length();
        if length > 0.0 { self / length } else { self }
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(xyz: [f32; 3]) -> Self {
        Vec3(xyz[0], xyz[1], xyz[2])
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(vector: Vec3) -> Self {
        vector.to_array()
    }
}

impl Add<Vec3> for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3(self.0 + other.0, self.1 + other.1, self.2 + other.2)
    }
}

impl Sub<Vec3> for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3(self.0 - other.0, self.1 - other.1, self.2 - other.2)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, scale: f32) -> Vec3 {
        self.map(|value| value * scale)
    }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;
    fn div(self, divisor: f32) -> Vec3 {
        self.map(|value| value / divisor)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        self.map(|value| -value)
    }
}


/// Area of the triangle spanned by the three points.
pub fn triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b - a).cross(c - a).length() * 0.5
}

/// The unit normal of the triangle, following the orientation `a`, `b`, `c`.
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (c - b).cross(a - b).normalized()
}

/// Solve the linear system whose matrix has the specified rows.
/// Returns `None` if the matrix is singular.
pub fn solve_3x3(rows: [Vec3; 3], right: Vec3) -> Option<Vec3> {
    let [r0, r1, r2] = rows;
    let determinant = r0.dot(r1.cross(r2));
    if determinant.abs() < f32::EPSILON { return None; }

    // cramer's rule, using the columns of the inverse
    let inverse_columns = [r1.cross(r2), r2.cross(r0), r0.cross(r1)];
    Some((inverse_columns[0] * right.0 + inverse_columns[1] * right.1 + inverse_columns[2] * right.2) / determinant)
}

/// The point of the closed triangle `abc` that is nearest to `point`.
pub fn closest_point_on_triangle(point: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let [u, v, w] = closest_weights_on_triangle(point, a, b, c);
    a * u + b * v + c * w
}

/// The barycentric weights of the point of the closed triangle `abc` that is nearest to `point`.
/// Weights of vertices not adjacent to the nearest edge or vertex are exactly zero.
// see "Real-Time Collision Detection", chapter 5.1.5
pub fn closest_weights_on_triangle(point: Vec3, a: Vec3, b: Vec3, c: Vec3) -> [f32; 3] {
    let ab = b - a;
    let ac = c - a;

    let ap = point - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 { return [1.0, 0.0, 0.0]; }

    let bp = point - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 { return [0.0, 1.0, 0.0]; }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let t = d1 / (d1 - d3);
        return [1.0 - t, t, 0.0];
    }

    let cp = point - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 { return [0.0, 0.0, 1.0]; }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let t = d2 / (d2 - d6);
        return [1.0 - t, 0.0, t];
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let t = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return [0.0, 1.0 - t, t];
    }

    let denominator = 1.0 / (va + vb + vc);
    let v = vb * denominator;
    let w = vc * denominator;
    [1.0 - v - w, v, w]
}


/// The weight of each triangle vertex for the barycentric areas of a projection.
///
/// `areas[1]` is the area of the sub-triangle opposite of the first vertex,
/// `areas[2]` opposite of the second and `areas[0]` opposite of the third.
/// Returns `None` if the areas do not sum up to a positive value.
pub fn barycentric_weights(areas: [f32; 3]) -> Option<[f32; 3]> {
    let sum = areas[0] + areas[1] + areas[2];
    if sum > 0.0 { Some([areas[1] / sum, areas[2] / sum, areas[0] / sum]) }
    else { None }
}

/// The point inside the triangle described by the barycentric areas.
pub fn unproject(corners: [Vec3; 3], areas: [f32; 3]) -> Option<Vec3> {
    let weights = barycentric_weights(areas)?;
    Some(corners[0] * weights[0] + corners[1] * weights[1] + corners[2] * weights[2])
}


/// Axis aligned box given by its minimum and maximum corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {

    /// Smallest coordinate on each axis.
    pub min: Vec3,

    /// Largest coordinate on each axis.
    pub max: Vec3,
}

impl Extent {

    /// Whether the point lies inside the box, including its surface.
    pub fn contains(&self, point: Vec3) -> bool {
        point.0 >= self.min.0 && point.0 <= self.max.0
            && point.1 >= self.min.1 && point.1 <= self.max.1
            && point.2 >= self.min.2 && point.2 <= self.max.2
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn closest_point_regions(){
        let a = Vec3(0.0, 0.0, 0.0);
        let b = Vec3(1.0, 0.0, 0.0);
        let c = Vec3(0.0, 1.0, 0.0);

        // above the face
        assert_eq!(closest_point_on_triangle(Vec3(0.25, 0.25, 3.0), a, b, c), Vec3(0.25, 0.25, 0.0));

        // beyond a vertex
        assert_eq!(closest_point_on_triangle(Vec3(-1.0, -1.0, 0.0), a, b, c), a);

        // beside an edge
        assert_eq!(closest_point_on_triangle(Vec3(0.5, -2.0, 0.0), a, b, c), Vec3(0.5, 0.0, 0.0));
    }

    #[test]
    fn closest_weights_are_degenerate_off_the_face(){
        let a = Vec3(0.0, 0.0, 0.0);
        let b = Vec3(1.0, 0.0, 0.0);
        let c = Vec3(0.0, 1.0, 0.0);

        assert_eq!(closest_weights_on_triangle(Vec3(0.5, -2.0, 0.0), a, b, c), [0.5, 0.5, 0.0]);
        assert_eq!(closest_weights_on_triangle(Vec3(0.0, 3.0, 1.0), a, b, c), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn unproject_weights_rotate(){
        let corners = [Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(0.0, 1.0, 0.0)];
        assert_eq!(unproject(corners, [0.5, 0.25, 0.25]), Some(Vec3(0.25, 0.5, 0.0)));
        assert_eq!(unproject(corners, [0.0, 0.0, 0.0]), None);
    }

    #[test]
    fn linear_system(){
        let rows = [Vec3(2.0, 0.0, 0.0), Vec3(0.0, 1.0, 1.0), Vec3(0.0, 0.0, 4.0)];
        let solution = solve_3x3(rows, Vec3(2.0, 3.0, 8.0)).unwrap();
        assert!(solution.distance(Vec3(1.0, 1.0, 2.0)) < 1e-6);
        assert_eq!(solve_3x3([Vec3::ZERO; 3], Vec3::ZERO), None);
    }

    #[test]
    fn normal_orientation(){
        let normal = triangle_normal(Vec3(0.0, 0.0, 0.0), Vec3(1.0, 0.0, 0.0), Vec3(0.0, 1.0, 0.0));
        assert_eq!(normal, Vec3(0.0, 0.0, 1.0));
    }

    #[test]
    fn area(){
        let area = triangle_area(Vec3(0.0, 0.0, 0.0), Vec3(2.0, 0.0, 0.0), Vec3(0.0, 2.0, 0.0));
        assert!((area - 2.0).abs() < 1e-6);
    }
}
