#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

impl Circle {
    fn contains(&self, (px, py): (f64, f64)) -> bool {
        let dx = px - self.x;
        let dy = py - self.y;
        (dx * dx + dy * dy).sqrt() <= self.radius + 1e-7
    }

    fn from_two(a: (f64, f64), b: (f64, f64)) -> Circle {
        let x = (a.0 + b.0) / 2.0;
        let y = (a.1 + b.1) / 2.0;
        let radius = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() / 2.0;
        Circle { x, y, radius }
    }

    // Circumcircle, or the widest two-point circle when the points are collinear.
    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Circle {
        let bx = b.0 - a.0;
        let by = b.1 - a.1;
        let cx = c.0 - a.0;
        let cy = c.1 - a.1;
        let d = 2.0 * (bx * cy - by * cx);
        if d.abs() < 1e-12 {
            let candidates = [Self::from_two(a, b), Self::from_two(a, c), Self::from_two(b, c)];
            return candidates
                .into_iter()
                .fold(candidates[0], |best, cand| {
                    if cand.radius > best.radius {
                        cand
                    } else {
                        best
                    }
                });
        }
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (cy * b2 - by * c2) / d;
        let uy = (bx * c2 - cx * b2) / d;
        Circle {
            x: ux + a.0,
            y: uy + a.1,
            radius: (ux * ux + uy * uy).sqrt(),
        }
    }
}

/// Smallest circle enclosing every point (incremental Welzl).
///
/// Returns `None` for an empty slice.
pub fn min_enclosing_circle(points: &[(i32, i32)]) -> Option<Circle> {
    let pts: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x as f64, y as f64)).collect();
    let first = *pts.first()?;

    let mut circle = Circle {
        x: first.0,
        y: first.1,
        radius: 0.0,
    };
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle {
            x: pts[i].0,
            y: pts[i].1,
            radius: 0.0,
        };
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_two(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = Circle::from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    Some(circle)
}
