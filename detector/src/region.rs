//! Frame differencing and connected-component extraction.
//!
//! Two frames are compared over their common rectangle (top-left aligned,
//! `min` of each dimension). A pixel is "changed" when the summed absolute
//! difference of its red, green and blue samples exceeds [`DIFF_THRESHOLD`].
//! Changed pixels are grouped into 4-connected regions by an iterative flood
//! fill seeded in row-major order, so regions come out in the order their
//! top-left-most pixel is reached by the scan.

use impact_common::frame::Frame;
use serde::Serialize;

use crate::point::Location;

/// Summed per-channel difference (0..=765) a pixel must exceed to count as changed.
pub const DIFF_THRESHOLD: u32 = 50;

/// Boolean grid of changed pixels over the common rectangle of two frames.
pub struct ChangeMask {
    width: u32,
    height: u32,
    changed: Vec<bool>,
}

impl ChangeMask {
    pub fn between(baseline: &Frame, current: &Frame) -> Self {
        let width = baseline.width().min(current.width());
        let height = baseline.height().min(current.height());
        let mut changed = Vec::with_capacity(width as usize * height as usize);

        for y in 0..height {
            for x in 0..width {
                let [r0, g0, b0] = baseline.rgb(x, y);
                let [r1, g1, b1] = current.rgb(x, y);
                let diff = r0.abs_diff(r1) as u32 + g0.abs_diff(g1) as u32 + b0.abs_diff(b1) as u32;
                changed.push(diff > DIFF_THRESHOLD);
            }
        }

        Self {
            width,
            height,
            changed,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_changed(&self, x: u32, y: u32) -> bool {
        self.changed[self.index(x, y)]
    }

    pub fn changed_count(&self) -> usize {
        self.changed.iter().filter(|&&c| c).count()
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Axis-aligned bounding box of one connected change region, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    /// Number of changed pixels in the region (not the bounding-box area).
    pub pixel_count: usize,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Both sides must reach `min_dimension`; a long thin scratch does not qualify.
    pub fn qualifies(&self, min_dimension: u32) -> bool {
        self.width() >= min_dimension && self.height() >= min_dimension
    }

    /// Bounding-box center normalized to a `total_width` x `total_height` area.
    pub fn center(&self, total_width: u32, total_height: u32) -> Location {
        let cx = self.min_x as f64 + self.width() as f64 / 2.0;
        let cy = self.min_y as f64 + self.height() as f64 / 2.0;
        Location {
            x: (cx / total_width as f64).clamp(0.0, 1.0),
            y: (cy / total_height as f64).clamp(0.0, 1.0),
        }
    }
}

/// All change regions between two frames.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Width of the common rectangle the regions were found in.
    pub width: u32,
    /// Height of the common rectangle the regions were found in.
    pub height: u32,
    /// Regions in discovery order.
    pub regions: Vec<Region>,
}

impl Extraction {
    /// Qualifying regions, in discovery order.
    pub fn qualifying(&self, min_dimension: u32) -> impl Iterator<Item = &Region> + '_ {
        self.regions.iter().filter(move |r| r.qualifies(min_dimension))
    }
}

pub fn extract_regions(baseline: &Frame, current: &Frame) -> Extraction {
    let mask = ChangeMask::between(baseline, current);
    Extraction {
        width: mask.width(),
        height: mask.height(),
        regions: find_regions(&mask),
    }
}

/// Label every 4-connected group of changed pixels.
///
/// Uses an explicit work-list so a region covering the whole frame cannot
/// exhaust the call stack.
pub fn find_regions(mask: &ChangeMask) -> Vec<Region> {
    let mut visited = vec![false; mask.changed.len()];
    let mut regions = Vec::new();
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for y in 0..mask.height {
        for x in 0..mask.width {
            let seed = mask.index(x, y);
            if visited[seed] || !mask.changed[seed] {
                continue;
            }

            visited[seed] = true;
            stack.push((x, y));
            let mut region = Region {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                pixel_count: 0,
            };

            while let Some((cx, cy)) = stack.pop() {
                region.min_x = region.min_x.min(cx);
                region.min_y = region.min_y.min(cy);
                region.max_x = region.max_x.max(cx);
                region.max_y = region.max_y.max(cy);
                region.pixel_count += 1;

                // Up, down, left, right; no diagonals.
                for (dx, dy) in [(0i64, -1i64), (0, 1), (-1, 0), (1, 0)] {
                    let nx = cx as i64 + dx;
                    let ny = cy as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= mask.width as i64 || ny >= mask.height as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    let i = mask.index(nx, ny);
                    if !visited[i] && mask.changed[i] {
                        visited[i] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            regions.push(region);
        }
    }

    regions
}
