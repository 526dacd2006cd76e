use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// the input tensor failed the [B,H,W,C] precondition
    #[error("invalid mask image: {0}")]
    InvalidInput(String),

    /// raw tensor data could not be converted between representations
    #[error("tensor data conversion failed: {0}")]
    TensorData(String),

    /// an image buffer could not be assembled from tensor data
    #[error("failed to assemble {0} image buffer")]
    ImageBuffer(&'static str),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
