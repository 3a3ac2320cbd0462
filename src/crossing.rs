use crate::config::CrossingConfig;
use crate::geometry::{Point, segment_intersection};
use serde::Serialize;

const SAME_POINT_EPS: f32 = 1e-3;

/// One place where a connection crosses another.
///
/// `jump` is set on the line that was added later; that line draws the bridge
/// decoration over the earlier one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crossing {
    pub with: String,
    pub point: Point,
    pub jump: bool,
}

#[derive(Debug, Clone)]
pub struct LineRoute {
    pub id: String,
    pub points: Vec<Point>,
}

fn same_point(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() <= SAME_POINT_EPS && (a.y - b.y).abs() <= SAME_POINT_EPS
}

fn is_route_end(route: &[Point], point: Point) -> bool {
    match (route.first(), route.last()) {
        (Some(first), Some(last)) => same_point(*first, point) || same_point(*last, point),
        _ => false,
    }
}

/// Crossings for every route, indexed like `routes`.
///
/// Routes are compared pairwise in registration order, so the result is the
/// same for every call over the same graph.
pub fn compute_crossings(routes: &[LineRoute], config: &CrossingConfig) -> Vec<Vec<Crossing>> {
    let mut result: Vec<Vec<Crossing>> = vec![Vec::new(); routes.len()];
    if !config.enabled {
        return result;
    }
    for (i, earlier) in routes.iter().enumerate() {
        for (j, later) in routes.iter().enumerate().skip(i + 1) {
            for seg_a in earlier.points.windows(2) {
                for seg_b in later.points.windows(2) {
                    let Some(point) = segment_intersection(seg_a[0], seg_a[1], seg_b[0], seg_b[1])
                    else {
                        continue;
                    };
                    if config.ignore_shared_endpoints
                        && (is_route_end(&earlier.points, point)
                            || is_route_end(&later.points, point))
                    {
                        continue;
                    }
                    // A hit on a bend point is reported by both segments meeting there.
                    if result[i]
                        .iter()
                        .any(|seen| seen.with == later.id && same_point(seen.point, point))
                    {
                        continue;
                    }
                    result[i].push(Crossing {
                        with: later.id.clone(),
                        point,
                        jump: false,
                    });
                    result[j].push(Crossing {
                        with: earlier.id.clone(),
                        point,
                        jump: true,
                    });
                }
            }
        }
    }
    result
}
