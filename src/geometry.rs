//! Plain 2D helpers over `[f64; 2]` points.

pub type Point = [f64; 2];

const EPS: f64 = 1e-9;

pub fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1]]
}

pub fn cross(a: Point, b: Point) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

pub fn length(a: Point) -> f64 {
    (a[0] * a[0] + a[1] * a[1]).sqrt()
}

/// Unit vector from `from` to `to`; zero when the points coincide.
pub fn direction(from: Point, to: Point) -> Point {
    let d = sub(to, from);
    let len = length(d);
    if len < EPS {
        [0.0, 0.0]
    } else {
        [d[0] / len, d[1] / len]
    }
}

/// Shoelace signed area. Positive for counter-clockwise polygons.
pub fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| cross(points[i], points[(i + 1) % n]))
        .sum();
    twice / 2.0
}

/// Proper crossing of two segments. Touching at an endpoint does not count.
pub fn segments_cross(a0: Point, a1: Point, b0: Point, b1: Point) -> bool {
    let d1 = cross(sub(a1, a0), sub(b0, a0));
    let d2 = cross(sub(a1, a0), sub(b1, a0));
    let d3 = cross(sub(b1, b0), sub(a0, b0));
    let d4 = cross(sub(b1, b0), sub(a1, b0));
    ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn point(p: Point) -> Self {
        Self { min: p, max: p }
    }

    pub fn zero() -> Self {
        Self::point([0.0, 0.0])
    }

    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        points
            .into_iter()
            .map(Self::point)
            .reduce(|acc, b| acc.union(&b))
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            min: [self.min[0].min(other.min[0]), self.min[1].min(other.min[1])],
            max: [self.max[0].max(other.max[0]), self.max[1].max(other.max[1])],
        }
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }
}
