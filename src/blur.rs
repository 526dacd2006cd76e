//! separable gaussian edge softening for weight fields

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use burn::prelude::{Backend, Tensor};
use burn::tensor::cast::ToElement;
use burn::tensor::TensorData;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;
use ndarray::Array3;

use crate::{Error, Result};

/// smallest kernel worth applying; anything below is a no-op
const MIN_KERNEL_SIZE: usize = 3;
/// cap on the derived kernel size, odd so the kernel stays centered
const MAX_KERNEL_SIZE: usize = 129;

/// working float precision of a backend, resolved once per call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precision {
    Full,
    Reduced,
}

impl Precision {
    /// `Reduced` when the backend computes in a float narrower than 32 bits
    pub fn of<B: Backend>() -> Self {
        if size_of::<B::FloatElem>() < size_of::<f32>() {
            Self::Reduced
        } else {
            Self::Full
        }
    }
}

/// kernel size derived from sigma: ~6 sigma wide, odd, at least 3, capped
/// at [`MAX_KERNEL_SIZE`]. returns 0 when sigma does not support a usable
/// kernel.
pub fn kernel_size_from_sigma(sigma: f32) -> usize {
    if sigma <= 0.0 {
        return 0;
    }
    let k = (6.0 * sigma).round() as usize;
    let k = k.max(MIN_KERNEL_SIZE) | 1; // ensure odd
    k.min(MAX_KERNEL_SIZE)
}

/// normalized 1-d gaussian weights of length k
pub fn gaussian_kernel(sigma: f32, k: usize) -> Vec<f32> {
    let mid = (k - 1) as f32 / 2.0;
    let mut weights: Vec<f32> = (0..k)
        .map(|i| {
            let d = i as f32 - mid;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let total: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// blurs the [B,H,W] target field with a separable gaussian.
///
/// the convolution runs in the backend's working precision. if a
/// reduced-precision backend reports out-of-memory mid-convolution, the
/// blur is recomputed on the host in f32 and the result moved back to the
/// original device and element type; any other failure propagates
/// unchanged.
pub fn soften_edges<B: Backend>(target: Tensor<B, 3>, sigma: f32) -> Result<Tensor<B, 3>> {
    let k = kernel_size_from_sigma(sigma);
    if k < MIN_KERNEL_SIZE {
        return Ok(target);
    }
    let kernel = gaussian_kernel(sigma, k);
    let precision = Precision::of::<B>();

    // accelerator backends surface allocation failure as a panic, so the
    // device attempt has to be unwind-isolated for the fallback to apply
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| device_blur(target.clone(), &kernel)));
    match attempt {
        Ok(blurred) => Ok(blurred),
        Err(payload) if precision == Precision::Reduced && is_out_of_memory(payload.as_ref()) => {
            log::warn!(
                "device ran out of memory during edge softening (kernel size {k}), \
                 retrying on the host in f32"
            );
            host_blur(target, &kernel)
        }
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// vertical then horizontal 1-d convolution on the target's own device
fn device_blur<B: Backend>(target: Tensor<B, 3>, kernel: &[f32]) -> Tensor<B, 3> {
    let device = target.device();
    let k = kernel.len();
    let radius = k / 2;

    let weights = TensorData::new(kernel.to_vec(), [k]);
    let vertical: Tensor<B, 4> = Tensor::<B, 1>::from_data(weights, &device).reshape([1, 1, k, 1]);
    let horizontal: Tensor<B, 4> = vertical.clone().reshape([1, 1, 1, k]);

    // conv2d wants [B,C,H,W]
    let field: Tensor<B, 4> = target.unsqueeze_dim(1);
    let field = conv2d(
        pad_rows(field, radius),
        vertical,
        None,
        ConvOptions::new([1, 1], [0, 0], [1, 1], 1),
    );
    let field = conv2d(
        pad_cols(field, radius),
        horizontal,
        None,
        ConvOptions::new([1, 1], [0, 0], [1, 1], 1),
    );
    field.squeeze(1)
}

/// extends the first and last row outward so the blur does not darken the
/// field toward the borders
fn pad_rows<B: Backend>(field: Tensor<B, 4>, radius: usize) -> Tensor<B, 4> {
    let [b, c, h, w] = field.dims();
    let top = field.clone().slice([0..b, 0..c, 0..1, 0..w]).repeat_dim(2, radius);
    let bottom = field
        .clone()
        .slice([0..b, 0..c, h - 1..h, 0..w])
        .repeat_dim(2, radius);
    Tensor::cat(vec![top, field, bottom], 2)
}

/// column counterpart of [`pad_rows`]
fn pad_cols<B: Backend>(field: Tensor<B, 4>, radius: usize) -> Tensor<B, 4> {
    let [b, c, h, w] = field.dims();
    let left = field.clone().slice([0..b, 0..c, 0..h, 0..1]).repeat_dim(3, radius);
    let right = field
        .clone()
        .slice([0..b, 0..c, 0..h, w - 1..w])
        .repeat_dim(3, radius);
    Tensor::cat(vec![left, field, right], 3)
}

/// f32 fallback over ndarray; replicate padding is expressed by clamping
/// the sample index to the field bounds
fn host_blur<B: Backend>(target: Tensor<B, 3>, kernel: &[f32]) -> Result<Tensor<B, 3>> {
    let device = target.device();
    let [batch, height, width] = target.dims();
    let radius = kernel.len() / 2;

    let values: Vec<f32> = target
        .into_data()
        .into_vec::<B::FloatElem>()
        .map_err(|e| Error::TensorData(format!("{e:?}")))?
        .iter()
        .map(|v| v.to_f32())
        .collect();
    let field = Array3::from_shape_vec((batch, height, width), values)
        .map_err(|e| Error::TensorData(e.to_string()))?;

    let field = Array3::from_shape_fn((batch, height, width), |(n, y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(i, &g)| g * field[[n, (y + i).saturating_sub(radius).min(height - 1), x]])
            .sum::<f32>()
    });
    let field = Array3::from_shape_fn((batch, height, width), |(n, y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(i, &g)| g * field[[n, y, (x + i).saturating_sub(radius).min(width - 1)]])
            .sum::<f32>()
    });

    let (values, _) = field.into_raw_vec_and_offset();
    Ok(Tensor::from_data(
        TensorData::new(values, [batch, height, width]),
        &device,
    ))
}

fn is_out_of_memory(payload: &(dyn Any + Send)) -> bool {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or_default()
        .to_ascii_lowercase();

    message.contains("out of memory") || message.contains("outofmemory") || message.contains("oom")
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    use super::*;

    #[test]
    fn kernel_size_is_zero_without_blur() {
        assert_eq!(kernel_size_from_sigma(0.0), 0);
        assert_eq!(kernel_size_from_sigma(-1.0), 0);
    }

    #[test]
    fn kernel_size_is_odd_and_at_least_three() {
        for i in 1..=640 {
            let k = kernel_size_from_sigma(i as f32 * 0.1);
            assert!(k >= 3);
            assert_eq!(k % 2, 1);
        }
    }

    #[test]
    fn kernel_size_grows_with_sigma() {
        let sizes: Vec<_> = (1..=640)
            .map(|i| kernel_size_from_sigma(i as f32 * 0.1))
            .collect();
        assert!(sizes.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn kernel_size_is_capped() {
        assert_eq!(kernel_size_from_sigma(1.0e4), 129);
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(2.0, kernel_size_from_sigma(2.0));
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        let len = kernel.len();
        for i in 0..len / 2 {
            assert!((kernel[i] - kernel[len - 1 - i]).abs() < 1e-6);
        }
        assert!(kernel.iter().all(|&w| w <= kernel[len / 2]));
    }

    #[test]
    fn softening_preserves_a_constant_field() {
        let device = NdArrayDevice::default();
        let ones = Tensor::<NdArray, 3>::ones([1, 8, 9], &device);

        let blurred = soften_edges(ones, 3.0).unwrap();

        let values = blurred.into_data().into_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (v - 1.0).abs() < 1e-5));
    }

    #[test]
    fn host_and_device_paths_agree() {
        let device = NdArrayDevice::default();
        // an off-center impulse exercises the replicate padding on every side
        let mut values = vec![0.0f32; 7 * 6];
        values[2 * 6 + 1] = 1.0;
        let field = Tensor::<NdArray, 3>::from_data(TensorData::new(values, [1, 7, 6]), &device);
        let kernel = gaussian_kernel(1.5, kernel_size_from_sigma(1.5));

        let device_out = device_blur(field.clone(), &kernel)
            .into_data()
            .into_vec::<f32>()
            .unwrap();
        let host_out = host_blur(field, &kernel)
            .unwrap()
            .into_data()
            .into_vec::<f32>()
            .unwrap();

        for (d, h) in device_out.iter().zip(&host_out) {
            assert!((d - h).abs() < 1e-5);
        }
    }
}
