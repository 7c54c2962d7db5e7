use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }

    pub fn zero() -> Self { Self::default() }

    /// Component along the given orientation (horizontal = x, vertical = y).
    pub fn along(&self, orientation: Orientation) -> f64 {
        match orientation {
            Orientation::Horizontal => self.x,
            Orientation::Vertical => self.y,
        }
    }

    pub fn with_along(&self, orientation: Orientation, value: f64) -> Point {
        match orientation {
            Orientation::Horizontal => Point::new(value, self.y),
            Orientation::Vertical => Point::new(self.x, value),
        }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn round(&self) -> Point { Point::new(self.x.round(), self.y.round()) }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point { Point::new(self.x + rhs.x, self.y + rhs.y) }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point { Point::new(self.x - rhs.x, self.y - rhs.y) }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point { Point::new(-self.x, -self.y) }
}

/// Screen rectangle in center/half-extent form. Width is `2 * half_size.x`,
/// height `2 * half_size.y`. The y axis grows downward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub center: Point,
    pub half_size: Point,
}

impl Rect {
    pub fn new(center: Point, half_size: Point) -> Self { Self { center, half_size } }

    pub fn from_corners(min: Point, max: Point) -> Self {
        Rect {
            center: Point::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0),
            half_size: Point::new((max.x - min.x) / 2.0, (max.y - min.y) / 2.0),
        }
    }

    /// Build from a top-left origin and full size, the form most runtimes
    /// report bounds in.
    pub fn from_origin_size(origin: Point, size: Point) -> Self {
        Rect {
            center: Point::new(origin.x + size.x / 2.0, origin.y + size.y / 2.0),
            half_size: Point::new(size.x / 2.0, size.y / 2.0),
        }
    }

    pub fn min(&self) -> Point { self.center - self.half_size }

    pub fn max(&self) -> Point { self.center + self.half_size }

    pub fn width(&self) -> f64 { self.half_size.x * 2.0 }

    pub fn height(&self) -> f64 { self.half_size.y * 2.0 }

    pub fn is_zero(&self) -> bool { self.half_size.x <= 0.0 && self.half_size.y <= 0.0 }

    pub fn translate(&self, delta: Point) -> Rect { Rect::new(self.center + delta, self.half_size) }

    pub fn contains(&self, point: Point) -> bool {
        let min = self.min();
        let max = self.max();
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_zero() {
            return *other;
        }
        if other.is_zero() {
            return *self;
        }
        let min = Point::new(self.min().x.min(other.min().x), self.min().y.min(other.min().y));
        let max = Point::new(self.max().x.max(other.max().x), self.max().y.max(other.max().y));
        Rect::from_corners(min, max)
    }

    /// Penetration depth along one axis; positive means the projections
    /// overlap by that many pixels.
    pub fn overlap_along(&self, other: &Rect, orientation: Orientation) -> f64 {
        let lo = self.min().along(orientation).max(other.min().along(orientation));
        let hi = self.max().along(orientation).min(other.max().along(orientation));
        hi - lo
    }

    /// True when the interiors overlap by more than `epsilon` on both axes.
    pub fn overlaps_interior(&self, other: &Rect, epsilon: f64) -> bool {
        self.overlap_along(other, Orientation::Horizontal) > epsilon
            && self.overlap_along(other, Orientation::Vertical) > epsilon
    }

    /// Signed gap from this rect's `direction`-facing edge to the opposite
    /// edge of `other`. Zero when the edges touch, positive when `other` lies
    /// further out in that direction.
    pub fn edge_gap(&self, other: &Rect, direction: Direction) -> f64 {
        let axis = direction.orientation();
        match direction.sign() {
            s if s > 0.0 => other.min().along(axis) - self.max().along(axis),
            _ => self.min().along(axis) - other.max().along(axis),
        }
    }

    pub fn approx_eq(&self, other: &Rect, epsilon: f64) -> bool {
        (self.center.x - other.center.x).abs() <= epsilon
            && (self.center.y - other.center.y).abs() <= epsilon
            && (self.half_size.x - other.half_size.x).abs() <= epsilon
            && (self.half_size.y - other.half_size.y).abs() <= epsilon
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn perpendicular(self) -> Orientation {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::Left, Direction::Right, Direction::Up, Direction::Down];

    pub fn orientation(self) -> Orientation {
        match self {
            Direction::Left | Direction::Right => Orientation::Horizontal,
            Direction::Up | Direction::Down => Orientation::Vertical,
        }
    }

    /// Unit sign of the direction along its own axis; y grows downward.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Left | Direction::Up => -1.0,
            Direction::Right | Direction::Down => 1.0,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}
