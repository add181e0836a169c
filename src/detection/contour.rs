//! Contour geometry: point compression and the minimal enclosing circle.

use imageproc::point::Point;

/// A circle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// Center `(x, y)`.
    pub center: (f64, f64),
    /// Radius in pixels.
    pub radius: f64,
}

impl Circle {
    fn from_point(p: (f64, f64)) -> Self {
        Self {
            center: p,
            radius: 0.0,
        }
    }

    fn from_diameter(a: (f64, f64), b: (f64, f64)) -> Self {
        let center = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
        Self {
            center,
            radius: distance(center, a),
        }
    }

    fn circumscribed(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let (bx, by) = (b.0 - a.0, b.1 - a.1);
        let (cx, cy) = (c.0 - a.0, c.1 - a.1);
        let d = 2.0 * (bx * cy - by * cx);

        if d.abs() < f64::EPSILON {
            // Collinear: the two farthest-apart points span the circle.
            return [
                Self::from_diameter(a, b),
                Self::from_diameter(a, c),
                Self::from_diameter(b, c),
            ]
            .into_iter()
            .fold(Self::from_point(a), |best, circle| {
                if circle.radius > best.radius {
                    circle
                } else {
                    best
                }
            });
        }

        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (cy * b2 - by * c2) / d;
        let uy = (bx * c2 - cx * b2) / d;
        let center = (a.0 + ux, a.1 + uy);
        Self {
            center,
            radius: distance(center, a),
        }
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        distance(self.center, p) <= self.radius + 1e-7 * self.radius.max(1.0)
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Drops the interior points of horizontal, vertical and diagonal runs,
/// keeping only the points where the chain changes direction.
pub fn compress_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }

    let step = |from: Point<i32>, to: Point<i32>| ((to.x - from.x).signum(), (to.y - from.y).signum());

    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect()
}

/// Smallest circle containing every point (incremental Welzl).
///
/// Returns a zero-radius circle at the origin for an empty slice.
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Circle {
    let pts: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect();

    let Some(&first) = pts.first() else {
        return Circle::from_point((0.0, 0.0));
    };

    let mut circle = Circle::from_point(first);
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle::from_point(pts[i]);
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_diameter(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = Circle::circumscribed(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    circle
}
