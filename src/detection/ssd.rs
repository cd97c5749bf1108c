//! Anchor generation for Single Shot MultiBox Detectors (SSDs).
//!
//! Only covers what the palm detection network needs: every anchor is centered in its feature map
//! cell and has a fixed unit size.

use std::ops::Index;

use itertools::iproduct;

use crate::image::Resolution;

/// An anchor of an SSD network, with its center in `0.0..=1.0` of the input image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// Describes an output layer of an SSD network.
#[derive(Debug, Clone, Copy)]
pub struct LayerInfo {
    boxes_per_cell: u32,
    resolution: Resolution,
}

impl LayerInfo {
    /// Creates a layer with a `width`x`height` feature map and `boxes_per_cell` anchors per cell.
    pub const fn new(boxes_per_cell: u32, width: u32, height: u32) -> Self {
        assert!(boxes_per_cell != 0, "SSD layer needs at least one box per cell");
        Self {
            boxes_per_cell,
            resolution: Resolution::new(width, height),
        }
    }
}

/// The anchors of all layers, in network output order.
#[derive(Debug)]
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    pub fn calculate(layers: &[LayerInfo]) -> Self {
        let mut anchors = Vec::new();
        for layer in layers {
            let (width, height) = (layer.resolution.width(), layer.resolution.height());
            // Row-major over the feature map, all boxes of a cell next to each other.
            for (y, x, _) in iproduct!(0..height, 0..width, 0..layer.boxes_per_cell) {
                anchors.push(Anchor {
                    x_center: (x as f32 + 0.5) / width as f32,
                    y_center: (y as f32 + 0.5) / height as f32,
                });
            }
        }

        Self { anchors }
    }

    /// Returns the total number of anchors.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl Index<usize> for Anchors {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palm_anchor_layout() {
        let anchors = Anchors::calculate(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)]);
        assert_eq!(anchors.anchor_count(), 2016);

        let first = anchors[0];
        assert_eq!(first.x_center(), 0.5 / 24.0);
        assert_eq!(first.y_center(), 0.5 / 24.0);
        // Both boxes of a cell share its center.
        assert_eq!(anchors[1], first);
        assert_eq!(anchors[2].x_center(), 1.5 / 24.0);

        // First anchor of the second layer.
        let coarse = anchors[24 * 24 * 2];
        assert_eq!(coarse.x_center(), 0.5 / 12.0);
        assert_eq!(coarse.y_center(), 0.5 / 12.0);

        let last = anchors[2015];
        assert_eq!(last.x_center(), 11.5 / 12.0);
        assert_eq!(last.y_center(), 11.5 / 12.0);
    }
}
