//! conversion of semantic masks and id maps into soft weight maps for
//! diffusion conditioning

pub mod blur;
pub mod burnops;
pub mod error;
pub mod extract;
pub mod registry;

use burn::prelude::{Backend, Tensor};

pub use error::{Error, Result};
pub use extract::{WeightMap, WeightMapExtractor};

pub const WEIGHT_MIN: f32 = 0.0;
pub const WEIGHT_MAX: f32 = 1.0;

pub trait WeightMapNode<B: Backend> {
    /// maps a channel-last [B,H,W,C] mask image in 0..1 to a weight mask
    /// and an rgb preview of it
    fn make_weight_map(&self, mask_image: Tensor<B, 4>) -> Result<WeightMap<B>>;
}
