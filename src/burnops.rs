//! conversions between image buffers and burn tensors

use burn::prelude::{Backend, Tensor};
use burn::tensor::cast::ToElement;
use burn::tensor::TensorData;
use image::{DynamicImage, GrayImage, RgbImage};

use crate::{Error, Result, WEIGHT_MAX, WEIGHT_MIN};

const RGB_CHANNELS: usize = 3;

/// converts an image into a [1,H,W,1] channel-last mask tensor, reading it
/// as grayscale in 0..1
pub fn image_to_mask_tensor<B: Backend>(image: &DynamicImage, device: &B::Device) -> Tensor<B, 4> {
    let gray = image.to_luma32f();
    let (width, height) = gray.dimensions();

    let data = TensorData::new(gray.into_raw(), [1, height as usize, width as usize, 1]);
    Tensor::from_data(data, device)
}

/// converts the first batch element of a [B,H,W] weight mask into a
/// grayscale image
pub fn mask_tensor_to_image<B: Backend>(mask: Tensor<B, 3>) -> Result<GrayImage> {
    let [_, height, width] = mask.dims();
    let values = tensor_values::<B>(mask.into_data())?;

    let pixels: Vec<u8> = values[..height * width].iter().map(to_byte).collect();
    GrayImage::from_raw(width as u32, height as u32, pixels).ok_or(Error::ImageBuffer("grayscale"))
}

/// converts the first batch element of a [B,H,W,3] preview tensor into an
/// rgb image. the channel-last layout is already interleaved the way the
/// image buffer expects.
pub fn preview_tensor_to_image<B: Backend>(preview: Tensor<B, 4>) -> Result<RgbImage> {
    let [_, height, width, channels] = preview.dims();
    debug_assert_eq!(channels, RGB_CHANNELS);

    let values = tensor_values::<B>(preview.into_data())?;

    let pixels: Vec<u8> = values[..height * width * RGB_CHANNELS]
        .iter()
        .map(to_byte)
        .collect();
    RgbImage::from_raw(width as u32, height as u32, pixels).ok_or(Error::ImageBuffer("rgb"))
}

fn tensor_values<B: Backend>(data: TensorData) -> Result<Vec<f32>> {
    Ok(data
        .into_vec::<B::FloatElem>()
        .map_err(|e| Error::TensorData(format!("{e:?}")))?
        .iter()
        .map(|v| v.to_f32())
        .collect())
}

fn to_byte(value: &f32) -> u8 {
    (value.clamp(WEIGHT_MIN, WEIGHT_MAX) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;
    use image::Luma;

    use super::*;

    #[test]
    fn grayscale_pixels_are_normalized() {
        let mut gray = GrayImage::new(2, 2);
        gray.put_pixel(0, 0, Luma([0]));
        gray.put_pixel(1, 0, Luma([51]));
        gray.put_pixel(0, 1, Luma([102]));
        gray.put_pixel(1, 1, Luma([255]));

        let tensor = image_to_mask_tensor::<NdArray>(
            &DynamicImage::ImageLuma8(gray),
            &NdArrayDevice::default(),
        );

        assert_eq!(tensor.dims(), [1, 2, 2, 1]);
        let values = tensor.into_data().into_vec::<f32>().unwrap();
        for (value, expected) in values.iter().zip([0.0, 0.2, 0.4, 1.0]) {
            assert!((value - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn mask_export_takes_the_first_batch_element() {
        let device = NdArrayDevice::default();
        let mask = Tensor::<NdArray, 3>::from_data(
            TensorData::new(vec![0.0f32, 1.0, 0.5, 0.25, 0.9, 0.9, 0.9, 0.9], [2, 2, 2]),
            &device,
        );

        let image = mask_tensor_to_image(mask).unwrap();

        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        assert_eq!(image.get_pixel(1, 0)[0], 255);
        assert_eq!(image.get_pixel(0, 1)[0], 127);
    }
}
