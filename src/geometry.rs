use serde::Serialize;

const EPS: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Absolute position of a point given as fractions of the box.
    pub fn anchor(&self, rel_x: f32, rel_y: f32) -> Point {
        Point::new(self.x + self.width * rel_x, self.y + self.height * rel_y)
    }

    pub fn center(&self) -> Point {
        self.anchor(0.5, 0.5)
    }
}

fn orientation(a: Point, b: Point, c: Point) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn point_on_segment(point: Point, a: Point, b: Point) -> bool {
    point.x >= a.x.min(b.x) - EPS
        && point.x <= a.x.max(b.x) + EPS
        && point.y >= a.y.min(b.y) - EPS
        && point.y <= a.y.max(b.y) + EPS
}

pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    let crosses = ((o1 > EPS && o2 < -EPS) || (o1 < -EPS && o2 > EPS))
        && ((o3 > EPS && o4 < -EPS) || (o3 < -EPS && o4 > EPS));
    if crosses {
        return true;
    }
    if o1.abs() <= EPS && point_on_segment(c, a, b) {
        return true;
    }
    if o2.abs() <= EPS && point_on_segment(d, a, b) {
        return true;
    }
    if o3.abs() <= EPS && point_on_segment(a, c, d) {
        return true;
    }
    if o4.abs() <= EPS && point_on_segment(b, c, d) {
        return true;
    }
    false
}

/// Single crossing point of segments `ab` and `cd`.
///
/// Parallel and collinear segments have no single crossing point and yield `None`,
/// so overlapping lines are never decorated as crossings.
pub fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Point> {
    if !segments_intersect(a, b, c, d) {
        return None;
    }
    let r = (b.x - a.x, b.y - a.y);
    let s = (d.x - c.x, d.y - c.y);
    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() <= EPS {
        return None;
    }
    let t = ((c.x - a.x) * s.1 - (c.y - a.y) * s.0) / denom;
    Some(Point::new(a.x + t * r.0, a.y + t * r.1))
}

pub fn points_to_path(points: &[Point]) -> String {
    let mut d = String::new();
    for (idx, point) in points.iter().enumerate() {
        let cmd = if idx == 0 { 'M' } else { 'L' };
        if idx > 0 {
            d.push(' ');
        }
        d.push_str(&format!("{cmd} {:.2} {:.2}", point.x, point.y));
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_segments_meet_at_center() {
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        )
        .unwrap();
        assert!((hit.x - 5.0).abs() < 1e-3);
        assert!((hit.y - 5.0).abs() < 1e-3);
    }

    #[test]
    fn disjoint_and_collinear_segments_do_not_cross() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!(segment_intersection(a, b, Point::new(0.0, 5.0), Point::new(10.0, 5.0)).is_none());
        assert!(segment_intersection(a, b, Point::new(5.0, 0.0), Point::new(15.0, 0.0)).is_none());
        assert!(segments_intersect(a, b, Point::new(5.0, 0.0), Point::new(15.0, 0.0)));
    }

    #[test]
    fn anchor_uses_fractions_of_bounds() {
        let bounds = Bounds::new(10.0, 20.0, 40.0, 20.0);
        assert_eq!(bounds.anchor(1.0, 0.5), Point::new(50.0, 30.0));
        assert_eq!(bounds.center(), Point::new(30.0, 30.0));
    }

    #[test]
    fn path_string_uses_move_then_line() {
        let d = points_to_path(&[Point::new(0.0, 0.0), Point::new(1.5, 2.0)]);
        assert_eq!(d, "M 0.00 0.00 L 1.50 2.00");
    }
}
