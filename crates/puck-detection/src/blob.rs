use crate::circle::min_enclosing_circle;
use crate::contour::{contours_from_mask, Contour};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Exclusive size limits a contour must satisfy to count as a blob.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlobBounds {
    pub min_area: f64,
    pub max_area: f64,
    pub min_radius: f64,
    pub max_radius: f64,
}

impl BlobBounds {
    pub fn accepts(&self, area: f64, radius: f64) -> bool {
        self.min_area < area
            && area < self.max_area
            && self.min_radius < radius
            && radius < self.max_radius
    }
}

impl Default for BlobBounds {
    fn default() -> Self {
        Self {
            min_area: 300.0,
            max_area: 500.0,
            min_radius: 10.0,
            max_radius: 20.0,
        }
    }
}

/// Which qualifying contour wins when more than one passes the bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobSelection {
    First,
    #[default]
    Largest,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blob {
    /// Moment centroid in pixels, as (x, y).
    pub centroid: (f64, f64),
    /// Radius of the minimum enclosing circle.
    pub radius: f64,
    pub area: f64,
}

impl Blob {
    fn from_contour(contour: &Contour) -> Option<Blob> {
        let centroid = contour.centroid()?;
        let radius = min_enclosing_circle(&contour.points)?.radius;
        Some(Blob {
            centroid,
            radius,
            area: contour.area(),
        })
    }
}

/// Locates the blob in `mask` whose area and enclosing radius fall inside `bounds`.
pub fn extract(mask: ArrayView2<u8>, bounds: &BlobBounds, selection: BlobSelection) -> Option<Blob> {
    let mut candidates = contours_from_mask(mask).into_iter().filter_map(|contour| {
        let area = contour.area();
        if area <= bounds.min_area || area >= bounds.max_area {
            return None;
        }
        let circle = min_enclosing_circle(&contour.points)?;
        if !bounds.accepts(area, circle.radius) {
            return None;
        }
        let centroid = contour.centroid()?;
        Some(Blob {
            centroid,
            radius: circle.radius,
            area,
        })
    });

    match selection {
        BlobSelection::First => candidates.next(),
        BlobSelection::Largest => candidates.max_by(|a, b| a.area.total_cmp(&b.area)),
    }
}

/// Every blob in `mask` with a non-degenerate centroid, unfiltered by size.
pub fn all_blobs(mask: ArrayView2<u8>) -> Vec<Blob> {
    contours_from_mask(mask)
        .iter()
        .filter_map(Blob::from_contour)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn draw_disc(mask: &mut Array2<u8>, cx: f64, cy: f64, r: f64) {
        let (h, w) = mask.dim();
        for y in 0..h {
            for x in 0..w {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                if dx * dx + dy * dy <= r * r {
                    mask[(y, x)] = 255;
                }
            }
        }
    }

    fn puck_bounds(r: f64) -> BlobBounds {
        let area = std::f64::consts::PI * r * r;
        BlobBounds {
            min_area: area * 0.6,
            max_area: area * 1.4,
            min_radius: r * 0.7,
            max_radius: r * 1.3,
        }
    }

    #[test]
    fn disc_centroid_within_one_pixel() {
        let mut mask = Array2::zeros((60, 80));
        draw_disc(&mut mask, 41.0, 27.0, 12.0);

        let blob = extract(mask.view(), &puck_bounds(12.0), BlobSelection::First).unwrap();
        assert!((blob.centroid.0 - 41.0).abs() < 1.0);
        assert!((blob.centroid.1 - 27.0).abs() < 1.0);
        assert!((blob.radius - 12.0).abs() < 1.5);
    }

    #[test]
    fn rejects_blobs_outside_bounds() {
        let mut mask = Array2::zeros((60, 80));
        draw_disc(&mut mask, 20.0, 20.0, 4.0);
        draw_disc(&mut mask, 60.0, 30.0, 18.0);
        assert!(extract(mask.view(), &puck_bounds(10.0), BlobSelection::Largest).is_none());
    }

    #[test]
    fn selection_policy_picks_first_or_largest() {
        let mut mask = Array2::zeros((60, 100));
        draw_disc(&mut mask, 15.0, 15.0, 9.0);
        draw_disc(&mut mask, 70.0, 40.0, 11.0);
        let bounds = BlobBounds {
            min_area: 100.0,
            max_area: 600.0,
            min_radius: 5.0,
            max_radius: 15.0,
        };

        let first = extract(mask.view(), &bounds, BlobSelection::First).unwrap();
        assert!((first.centroid.0 - 15.0).abs() < 1.0);

        let largest = extract(mask.view(), &bounds, BlobSelection::Largest).unwrap();
        assert!((largest.centroid.0 - 70.0).abs() < 1.0);
    }

    #[test]
    fn empty_mask_has_no_blob() {
        let mask = Array2::zeros((10, 10));
        assert!(extract(mask.view(), &BlobBounds::default(), BlobSelection::First).is_none());
        assert!(all_blobs(mask.view()).is_empty());
    }

    #[test]
    fn all_blobs_skips_degenerate_regions() {
        let mut mask = Array2::zeros((30, 30));
        mask[(2, 2)] = 255;
        draw_disc(&mut mask, 20.0, 20.0, 4.0);
        let blobs = all_blobs(mask.view());
        assert_eq!(blobs.len(), 1);
        assert!((blobs[0].centroid.0 - 20.0).abs() < 0.5);
    }
}
