use ndarray::{Array2, ArrayView2};

/// Outer boundary of one 8-connected foreground region.
#[derive(Clone, Debug)]
pub struct Contour {
    /// Boundary pixel centres in tracing order, as (x, y).
    pub points: Vec<(i32, i32)>,
    /// Number of foreground pixels in the region.
    pub pixel_count: usize,
}

// Clockwise from west, in image coordinates (y grows downwards).
const NEIGHBORS: [(i32, i32); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

fn direction_of(dx: i32, dy: i32) -> usize {
    NEIGHBORS
        .iter()
        .position(|&d| d == (dx, dy))
        .unwrap_or(0)
}

impl Contour {
    /// Polygon area of the boundary (shoelace over pixel centres).
    pub fn area(&self) -> f64 {
        self.raw_moments().0.abs()
    }

    /// Zeroth and first order moments of the boundary polygon: (m00, m10, m01).
    ///
    /// Signs follow the traversal direction; callers divide them so only the
    /// ratios matter.
    pub fn raw_moments(&self) -> (f64, f64, f64) {
        let n = self.points.len();
        if n < 3 {
            return (0.0, 0.0, 0.0);
        }
        let (mut m00, mut m10, mut m01) = (0.0, 0.0, 0.0);
        for i in 0..n {
            let (x0, y0) = self.points[i];
            let (x1, y1) = self.points[(i + 1) % n];
            let (x0, y0, x1, y1) = (x0 as f64, y0 as f64, x1 as f64, y1 as f64);
            let cross = x0 * y1 - x1 * y0;
            m00 += cross;
            m10 += (x0 + x1) * cross;
            m01 += (y0 + y1) * cross;
        }
        (m00 / 2.0, m10 / 6.0, m01 / 6.0)
    }

    /// Centroid from the polygon moments, or `None` when the enclosed area is zero.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let (m00, m10, m01) = self.raw_moments();
        if m00.abs() < f64::EPSILON {
            return None;
        }
        Some((m10 / m00, m01 / m00))
    }
}

/// Finds the outer contour of every 8-connected foreground region of `mask`.
///
/// Any non-zero pixel counts as foreground. Regions are returned in raster
/// order of their top-left-most pixel.
pub fn contours_from_mask(mask: ArrayView2<u8>) -> Vec<Contour> {
    let (height, width) = mask.dim();
    let mut labels = Array2::<u32>::zeros((height, width));
    let mut contours = Vec::new();
    let mut stack = Vec::new();
    let mut next_label = 0u32;

    for y in 0..height {
        for x in 0..width {
            if mask[(y, x)] == 0 || labels[(y, x)] != 0 {
                continue;
            }
            next_label += 1;
            let pixel_count = flood_label(mask, &mut labels, &mut stack, (x, y), next_label);
            let points = trace_boundary(labels.view(), (x as i32, y as i32), next_label, pixel_count);
            contours.push(Contour {
                points,
                pixel_count,
            });
        }
    }
    contours
}

fn flood_label(
    mask: ArrayView2<u8>,
    labels: &mut Array2<u32>,
    stack: &mut Vec<(usize, usize)>,
    seed: (usize, usize),
    label: u32,
) -> usize {
    let (height, width) = mask.dim();
    let mut count = 0;
    stack.clear();
    stack.push(seed);
    labels[(seed.1, seed.0)] = label;

    while let Some((x, y)) = stack.pop() {
        count += 1;
        for &(dx, dy) in &NEIGHBORS {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                continue;
            }
            let (nx, ny) = (nx as usize, ny as usize);
            if mask[(ny, nx)] != 0 && labels[(ny, nx)] == 0 {
                labels[(ny, nx)] = label;
                stack.push((nx, ny));
            }
        }
    }
    count
}

// Moore-neighbour tracing; stops when the start pixel is left in its first direction again.
fn trace_boundary(
    labels: ArrayView2<u32>,
    start: (i32, i32),
    label: u32,
    pixel_count: usize,
) -> Vec<(i32, i32)> {
    let (height, width) = labels.dim();
    let inside = |x: i32, y: i32| {
        x >= 0
            && y >= 0
            && (x as usize) < width
            && (y as usize) < height
            && labels[(y as usize, x as usize)] == label
    };

    let mut points = vec![start];
    let mut current = start;
    // The start pixel is the first of its region in raster order, so west is outside.
    let mut backtrack = 0usize;
    let mut first_move: Option<usize> = None;
    let limit = 4 * pixel_count + 8;

    for _ in 0..limit {
        let found = (1..=8)
            .map(|i| (backtrack + i) % 8)
            .find(|&d| inside(current.0 + NEIGHBORS[d].0, current.1 + NEIGHBORS[d].1));
        let Some(dir) = found else {
            break;
        };

        if current == start {
            match first_move {
                Some(first) if first == dir => break,
                None => first_move = Some(dir),
                _ => {}
            }
        }

        let prev = (dir + 7) % 8;
        let next = (current.0 + NEIGHBORS[dir].0, current.1 + NEIGHBORS[dir].1);
        backtrack = direction_of(
            NEIGHBORS[prev].0 - NEIGHBORS[dir].0,
            NEIGHBORS[prev].1 - NEIGHBORS[dir].1,
        );
        current = next;
        if current == start {
            continue;
        }
        points.push(current);
    }
    points
}
