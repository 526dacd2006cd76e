//! weight-map extraction from semantic masks and id maps

use burn::prelude::{Backend, Tensor};
use burn::tensor::cast::ToElement;

use crate::{Error, Result, WEIGHT_MAX, WEIGHT_MIN, WeightMapNode, blur};

/// tolerance when checking whether a field only holds values inside [0,1]
const BINARY_EPS: f32 = 1e-4;
/// minimum max-min spread for a field to be treated as binary
const BINARY_SPREAD: f32 = 0.4;

/// result of a weight-map extraction
pub struct WeightMap<B: Backend> {
    /// [B,H,W] weight field in 0..1
    pub mask: Tensor<B, 3>,
    /// [B,H,W,3] preview with the weight field broadcast into every channel
    pub preview: Tensor<B, 4>,
}

/// converts a grayscale semantic image into a soft weight map by selecting
/// the target region and optionally softening its edges with a separable
/// gaussian blur
pub struct WeightMapExtractor {
    /// semantic class to extract; -1 treats any non-zero pixel as the mask,
    /// 0..=255 selects the class encoded in pixel intensity as id/255
    pub class_id: i32,
    /// gaussian sigma controlling how far the mask edges are softened
    pub sigma: f32,
    /// invert the resulting weight map
    pub invert: bool,
    /// gate for the edge-softening pass
    pub edge_soften: bool,
}

impl Default for WeightMapExtractor {
    fn default() -> Self {
        Self {
            class_id: -1,
            sigma: 2.0,
            invert: false,
            edge_soften: true,
        }
    }
}

impl<B: Backend> WeightMapNode<B> for WeightMapExtractor {
    fn make_weight_map(&self, mask_image: Tensor<B, 4>) -> Result<WeightMap<B>> {
        let [batch, height, width, channels] = mask_image.dims();
        if channels < 1 {
            return Err(Error::InvalidInput(format!(
                "mask image must be [B,H,W,C] with at least one channel, \
                 got shape [{batch},{height},{width},{channels}]"
            )));
        }

        // only the first channel carries the mask / id field
        let gray: Tensor<B, 3> = mask_image
            .slice([0..batch, 0..height, 0..width, 0..1])
            .squeeze(3);

        let target = self.select_target(gray);

        let target = if self.edge_soften && self.sigma > 0.0 {
            blur::soften_edges(target, self.sigma)?
        } else {
            target
        };

        let weight = if self.invert {
            target.ones_like() - target
        } else {
            target
        };
        // the convolution can overshoot the unit range slightly
        let weight = weight.clamp(WEIGHT_MIN, WEIGHT_MAX);

        let preview: Tensor<B, 4> =
            Tensor::stack(vec![weight.clone(), weight.clone(), weight.clone()], 3);

        Ok(WeightMap {
            mask: weight,
            preview,
        })
    }
}

impl WeightMapExtractor {
    /// selects the target region as a {0,1} field, deciding between binary
    /// thresholding and id-map lookup
    fn select_target<B: Backend>(&self, gray: Tensor<B, 3>) -> Tensor<B, 3> {
        if self.class_id == -1 || looks_binary(&gray) {
            log::debug!("thresholding a binary mask at 0.5");
            gray.greater_elem(0.5).float()
        } else {
            log::debug!("selecting id {} from an id map", self.class_id);
            gray.mul_scalar(255.0)
                .round()
                .int()
                .equal_elem(self.class_id)
                .float()
        }
    }
}

/// detects a binary-like field so a plain mask wired into the id input is
/// not misread as an id map: the values must sit inside [0,1] within
/// tolerance and straddle the 0.5 threshold with a wide spread
fn looks_binary<B: Backend>(gray: &Tensor<B, 3>) -> bool {
    let min = gray.clone().min().into_scalar().to_f32();
    let max = gray.clone().max().into_scalar().to_f32();

    max <= 1.0 + BINARY_EPS
        && min >= -BINARY_EPS
        && max > 0.5
        && min < 0.5
        && max - min > BINARY_SPREAD
}
