use crate::perspective::{FiducialSet, PixelPoint};
use ndarray::ArrayView2;
use puck_detection::{all_blobs, segment, BlobBounds, HsvRange};

/// Table corner a fiducial belongs to, in calibration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft = 0,
    TopRight = 1,
    BottomRight = 2,
    BottomLeft = 3,
}

impl Quadrant {
    /// Classifies a centroid against the frame centre.
    ///
    /// Points exactly on a centre line go to the lower-index quadrant: the
    /// top half includes `y == h/2`, the top-left includes `x == w/2`, and in
    /// the bottom half `x == w/2` is bottom-right.
    pub fn classify(point: PixelPoint, frame_width: usize, frame_height: usize) -> Quadrant {
        let half_w = frame_width as f64 / 2.0;
        let half_h = frame_height as f64 / 2.0;
        if point.y <= half_h {
            if point.x <= half_w {
                Quadrant::TopLeft
            } else {
                Quadrant::TopRight
            }
        } else if point.x >= half_w {
            Quadrant::BottomRight
        } else {
            Quadrant::BottomLeft
        }
    }
}

/// Fiducial search in progress: one optional corner per quadrant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PartialFiducials {
    corners: [Option<PixelPoint>; 4],
}

impl PartialFiducials {
    pub fn set(&mut self, quadrant: Quadrant, point: PixelPoint) {
        self.corners[quadrant as usize] = Some(point);
    }

    pub fn get(&self, quadrant: Quadrant) -> Option<PixelPoint> {
        self.corners[quadrant as usize]
    }

    /// Corners in quadrant order.
    pub fn corners(&self) -> [Option<PixelPoint>; 4] {
        self.corners
    }

    pub fn found(&self) -> usize {
        self.corners.iter().filter(|c| c.is_some()).count()
    }

    /// The complete set once every quadrant has a marker.
    pub fn complete(&self) -> Option<FiducialSet> {
        Some(FiducialSet {
            top_left: self.corners[0]?,
            top_right: self.corners[1]?,
            bottom_right: self.corners[2]?,
            bottom_left: self.corners[3]?,
        })
    }
}

/// Locates the four corner markers, one frame per call.
///
/// Markers found on earlier frames of the same run are kept until
/// [`FiducialCalibrator::reset`].
#[derive(Clone, Debug)]
pub struct FiducialCalibrator {
    range: HsvRange,
    kernel: usize,
    bounds: Option<BlobBounds>,
    partial: PartialFiducials,
}

impl FiducialCalibrator {
    pub fn new(range: HsvRange, kernel: usize) -> Self {
        Self {
            range,
            kernel,
            bounds: None,
            partial: PartialFiducials::default(),
        }
    }

    /// Ignore marker blobs whose size falls outside `bounds`.
    pub fn with_bounds(mut self, bounds: BlobBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn set_range(&mut self, range: HsvRange) {
        self.range = range;
    }

    pub fn partial(&self) -> &PartialFiducials {
        &self.partial
    }

    pub fn reset(&mut self) {
        self.partial = PartialFiducials::default();
    }

    /// Searches one camera frame; returns the set once all four corners are known.
    pub fn observe(&mut self, frame: ArrayView2<[u8; 3]>) -> Option<FiducialSet> {
        let (height, width) = frame.dim();
        let mask = segment(frame, &self.range, self.kernel);

        for blob in all_blobs(mask.view()) {
            if let Some(bounds) = &self.bounds {
                if !bounds.accepts(blob.area, blob.radius) {
                    continue;
                }
            }
            let point = PixelPoint::new(blob.centroid.0, blob.centroid.1);
            let quadrant = Quadrant::classify(point, width, height);
            tracing::trace!(?quadrant, x = point.x, y = point.y, "fiducial candidate");
            self.partial.set(quadrant, point);
        }

        let complete = self.partial.complete();
        if complete.is_none() {
            tracing::debug!(found = self.partial.found(), "fiducial search incomplete");
        }
        complete
    }
}
