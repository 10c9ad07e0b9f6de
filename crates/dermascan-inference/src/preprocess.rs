//! Deterministic image preprocessing
//!
//! Decodes uploaded bytes, resizes to the model's input size with a fixed
//! bilinear filter, and produces a normalized NHWC tensor. The same bytes
//! always yield the same tensor values.

use candle_core::{Device, Tensor};
use dermascan_core::{Error, Result};
use image::imageops::FilterType;

/// Turns raw image bytes into model input tensors.
pub struct Preprocessor {
    input_size: (usize, usize),
    divisor: f32,
    device: Device,
}

impl Preprocessor {
    /// Create a preprocessor for the given (height, width) and
    /// normalization divisor.
    pub fn new(input_size: (usize, usize), divisor: f32, device: Device) -> Self {
        Self {
            input_size,
            divisor,
            device,
        }
    }

    /// Decode, resize, and normalize into a [1, height, width, 3] tensor
    /// with every channel value in [0,1].
    ///
    /// Resizing uses bilinear interpolation (`FilterType::Triangle`); the
    /// filter is part of the contract and must not change, or cached model
    /// behavior drifts between deployments.
    pub fn normalize(&self, raw: &[u8]) -> Result<Tensor> {
        let img = image::load_from_memory(raw)
            .map_err(|e| Error::unsupported_image(format!("decode failed: {e}")))?;

        let (height, width) = self.input_size;
        let resized = img.resize_exact(width as u32, height as u32, FilterType::Triangle);
        let rgb = resized.to_rgb8();

        let data: Vec<f32> = rgb
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / self.divisor)
            .collect();

        Tensor::from_vec(data, (1, height, width, 3), &self.device)
            .map_err(|e| Error::unsupported_image(format!("tensor build failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn preprocessor() -> Preprocessor {
        Preprocessor::new((224, 224), 255.0, Device::Cpu)
    }

    #[test]
    fn test_normalize_shape_and_range() {
        let tensor = preprocessor().normalize(&png_bytes(64, 48)).unwrap();

        assert_eq!(tensor.dims(), &[1, 224, 224, 3]);

        let values = tensor.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let bytes = png_bytes(100, 100);
        let p = preprocessor();

        let a = p.normalize(&bytes).unwrap();
        let b = p.normalize(&bytes).unwrap();

        assert_eq!(
            a.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            b.flatten_all().unwrap().to_vec1::<f32>().unwrap()
        );
    }

    #[test]
    fn test_normalize_upscales_small_images() {
        let tensor = preprocessor().normalize(&png_bytes(8, 8)).unwrap();
        assert_eq!(tensor.dims(), &[1, 224, 224, 3]);
    }

    #[test]
    fn test_undecodable_bytes_are_rejected() {
        let err = preprocessor().normalize(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::UnsupportedImage(_)));
    }
}
