use anyhow::{anyhow, Result};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

use crate::utils::jpeg_utils;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Broad color classification of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode
{
	/// Single-channel luminance image.
	Grayscale,

	/// Multi-channel color image.
	Color,
}

impl fmt::Display for ColorMode
{
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
	{
		match self
		{
			ColorMode::Grayscale => write!(f, "Grayscale"),
			ColorMode::Color => write!(f, "Color"),
		}
	}
}

/// Chroma subsampling configuration for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSubsampling
{
	/// 4:4:4 - chroma kept at full resolution.
	Full,

	/// 4:2:0 - chroma halved in both directions.
	Quarter,
}

/// Capability interface over a loaded lossy image.
///
/// The quality search only talks to this trait, so it can be exercised
/// against synthetic implementations without touching a real codec.
pub trait ImageHandle: Sized
{
	/// Encoding quality reported for the image (1-100).
	fn quality(&self) -> u32;

	/// Exact number of unique colors in the decoded pixels.
	fn color_count(&self) -> u64;

	/// Image width in pixels.
	fn width(&self) -> u32;

	/// Image height in pixels.
	fn height(&self) -> u32;

	/// Broad color classification.
	fn color_mode(&self) -> ColorMode;

	/// Re-encode at the given quality and decode the result back, so later
	/// measurements see the real quantization loss rather than an attribute
	/// change.
	fn reencode(&self, quality: u32) -> Result<Self>;

	/// Normalized root-mean-square pixel difference against another image,
	/// in the range 0.0 (identical) to 1.0.
	fn compare_rmse(&self, other: &Self) -> Result<f64>;

	/// Chroma subsampling applied to subsequent encodes.
	fn set_chroma_subsampling(&mut self, subsampling: ChromaSubsampling);

	/// Drop ancillary metadata (EXIF, profiles, comments) on persistence.
	fn strip_metadata(&mut self);

	/// Persist the encoded bytes.
	fn save(&self, path: &Path) -> Result<()>;
}

/// A decoded JPEG image together with the byte stream it came from.
pub struct JpegImage
{
	pixels: image::RgbImage,
	encoded: Vec<u8>,
	quality: u32,
	color_mode: ColorMode,
	subsampling: ChromaSubsampling,
	strip_markers: bool,
}

impl JpegImage
{
	/// Load a JPEG file from disk.
	pub fn load(path: &Path) -> Result<Self>
	{
		let encoded = fs::read(path)
			.map_err(|e| anyhow!("Failed to read source file '{}': {}", path.display(), e))?;

		Self::from_bytes(encoded)
	}

	/// Decode a JPEG byte stream.
	///
	/// The encoding quality is recovered from the stream's luminance
	/// quantization table; streams without a readable table are treated as
	/// encoded at maximum quality.
	pub fn from_bytes(encoded: Vec<u8>) -> Result<Self>
	{
		if !jpeg_utils::is_jpeg_data(&encoded)
		{
			return Err(anyhow!("Invalid JPEG signature"));
		}

		let decoded = image::load_from_memory_with_format(&encoded, image::ImageFormat::Jpeg)
			.map_err(|e| anyhow!("Failed to decode JPEG: {}", e))?;

		let color_mode = match decoded.color()
		{
			image::ColorType::L8
			| image::ColorType::L16
			| image::ColorType::La8
			| image::ColorType::La16 => ColorMode::Grayscale,
			_ => ColorMode::Color,
		};

		let quality = jpeg_utils::estimate_quality(&encoded).unwrap_or(100);

		Ok(JpegImage
		{
			pixels: decoded.to_rgb8(),
			encoded,
			quality,
			color_mode,
			subsampling: ChromaSubsampling::Full,
			strip_markers: false,
		})
	}

	/// Encode the pixels at the given quality with the current settings.
	fn encode_at(&self, quality: u32) -> Result<Vec<u8>>
	{
		let (width, height) = self.pixels.dimensions();
		if width > u16::MAX as u32 || height > u16::MAX as u32
		{
			return Err(anyhow!("Image dimensions {}x{} exceed the JPEG limit", width, height));
		}

		let mut output: Vec<u8> = Vec::new();
		let mut encoder = Encoder::new(&mut output, quality.clamp(1, 100) as u8);
		encoder.set_sampling_factor(match self.subsampling
		{
			ChromaSubsampling::Full => SamplingFactor::F_1_1,
			ChromaSubsampling::Quarter => SamplingFactor::F_2_2,
		});

		match self.color_mode
		{
			ColorMode::Grayscale =>
			{
				// The decoder expanded luminance to RGB; any channel holds it.
				let luma: Vec<u8> = self.pixels.pixels().map(|pixel| pixel[0]).collect();
				encoder.encode(&luma, width as u16, height as u16, ColorType::Luma)
			}
			ColorMode::Color =>
			{
				encoder.encode(self.pixels.as_raw(), width as u16, height as u16, ColorType::Rgb)
			}
		}
		.map_err(|e| anyhow!("Failed to encode JPEG: {}", e))?;

		Ok(output)
	}
}

impl ImageHandle for JpegImage
{
	fn quality(&self) -> u32
	{
		self.quality
	}

	fn color_count(&self) -> u64
	{
		let mut colors: HashSet<[u8; 3]> = HashSet::new();
		for pixel in self.pixels.pixels()
		{
			colors.insert(pixel.0);
		}

		colors.len() as u64
	}

	fn width(&self) -> u32
	{
		self.pixels.width()
	}

	fn height(&self) -> u32
	{
		self.pixels.height()
	}

	fn color_mode(&self) -> ColorMode
	{
		self.color_mode
	}

	fn reencode(&self, quality: u32) -> Result<Self>
	{
		let encoded = self.encode_at(quality)?;

		// Decode the fresh bytes so measurements reflect the actual
		// quantization loss of this encoding.
		let decoded = image::load_from_memory_with_format(&encoded, image::ImageFormat::Jpeg)
			.map_err(|e| anyhow!("Failed to decode re-encoded JPEG: {}", e))?;

		Ok(JpegImage
		{
			pixels: decoded.to_rgb8(),
			encoded,
			quality,
			color_mode: self.color_mode,
			subsampling: self.subsampling,
			strip_markers: self.strip_markers,
		})
	}

	fn compare_rmse(&self, other: &Self) -> Result<f64>
	{
		if self.pixels.dimensions() != other.pixels.dimensions()
		{
			return Err(anyhow!("Cannot compare images of different dimensions"));
		}

		let mut sum: f64 = 0.0;
		for (a, b) in self.pixels.pixels().zip(other.pixels.pixels())
		{
			for channel in 0..3
			{
				let diff = a[channel] as f64 - b[channel] as f64;
				sum += diff * diff;
			}
		}

		let samples = (self.pixels.width() as f64) * (self.pixels.height() as f64) * 3.0;

		Ok((sum / samples).sqrt() / 255.0)
	}

	fn set_chroma_subsampling(&mut self, subsampling: ChromaSubsampling)
	{
		self.subsampling = subsampling;
	}

	fn strip_metadata(&mut self)
	{
		self.strip_markers = true;
	}

	fn save(&self, path: &Path) -> Result<()>
	{
		let data = if self.strip_markers
		{
			jpeg_utils::strip_markers(&self.encoded)?
		}
		else
		{
			self.encoded.clone()
		};

		fs::write(path, data)
			.map_err(|e| anyhow!("Failed to write '{}': {}", path.display(), e))?;

		Ok(())
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	/// Encode a raw RGB buffer at the given quality.
	fn encode_rgb(pixels: &[u8], width: u16, height: u16, quality: u8) -> Vec<u8>
	{
		let mut output: Vec<u8> = Vec::new();
		let encoder = Encoder::new(&mut output, quality);
		encoder.encode(pixels, width, height, ColorType::Rgb).expect("encoding succeeds");
		output
	}

	/// A noisy color test image with a deterministic pixel pattern.
	fn noisy_image(width: u16, height: u16, quality: u8) -> JpegImage
	{
		let mut pixels: Vec<u8> = Vec::with_capacity(width as usize * height as usize * 3);
		let mut state: u32 = 0x12345678;
		for _ in 0..(width as usize * height as usize)
		{
			for _ in 0..3
			{
				state = state.wrapping_mul(1664525).wrapping_add(1013904223);
				pixels.push((state >> 24) as u8);
			}
		}

		JpegImage::from_bytes(encode_rgb(&pixels, width, height, quality)).expect("valid JPEG")
	}

	/// A single-color test image.
	fn solid_image(rgb: [u8; 3], width: u16, height: u16) -> JpegImage
	{
		let pixels: Vec<u8> = (0..(width as usize * height as usize))
			.flat_map(|_| rgb)
			.collect();

		JpegImage::from_bytes(encode_rgb(&pixels, width, height, 90)).expect("valid JPEG")
	}

	#[test]
	fn rejects_non_jpeg_bytes()
	{
		assert!(JpegImage::from_bytes(b"\x89PNG\r\n\x1a\n".to_vec()).is_err());
	}

	#[test]
	fn quality_estimate_round_trips_through_the_encoder()
	{
		for &quality in &[60u8, 80, 90]
		{
			let img = noisy_image(32, 32, quality);
			assert!(
				img.quality().abs_diff(quality as u32) <= 5,
				"encoded at {}, estimated {}",
				quality,
				img.quality()
			);
		}
	}

	#[test]
	fn grayscale_images_are_classified()
	{
		let luma: Vec<u8> = (0..(16 * 16)).map(|i| (i % 256) as u8).collect();
		let mut output: Vec<u8> = Vec::new();
		let encoder = Encoder::new(&mut output, 90);
		encoder.encode(&luma, 16, 16, ColorType::Luma).expect("encoding succeeds");

		let img = JpegImage::from_bytes(output).expect("valid JPEG");
		assert_eq!(img.color_mode(), ColorMode::Grayscale);
	}

	#[test]
	fn color_images_are_classified()
	{
		let img = noisy_image(16, 16, 90);
		assert_eq!(img.color_mode(), ColorMode::Color);
		assert_eq!(img.width(), 16);
		assert_eq!(img.height(), 16);
	}

	#[test]
	fn solid_gray_counts_one_color()
	{
		// A flat mid-gray block survives quantization exactly.
		let img = solid_image([128, 128, 128], 16, 16);
		assert_eq!(img.color_count(), 1);
	}

	#[test]
	fn identical_images_compare_to_zero()
	{
		let img = noisy_image(16, 16, 90);
		let error = img.compare_rmse(&img).expect("same dimensions");
		assert_eq!(error, 0.0);
	}

	#[test]
	fn opposite_images_compare_near_one()
	{
		let black = solid_image([0, 0, 0], 16, 16);
		let white = solid_image([255, 255, 255], 16, 16);
		let error = black.compare_rmse(&white).expect("same dimensions");
		assert!(error > 0.95, "black vs white measured {}", error);
	}

	#[test]
	fn dimension_mismatch_is_an_error()
	{
		let small = noisy_image(16, 16, 90);
		let large = noisy_image(32, 32, 90);
		assert!(small.compare_rmse(&large).is_err());
	}

	#[test]
	fn reencode_materializes_the_quality_change()
	{
		let img = noisy_image(32, 32, 95);
		let candidate = img.reencode(40).expect("encoding succeeds");

		assert_eq!(candidate.quality(), 40);
		assert_eq!(candidate.width(), img.width());
		assert_eq!(candidate.height(), img.height());

		// A heavy quality drop on a noisy image must show up in the pixels.
		let error = img.compare_rmse(&candidate).expect("same dimensions");
		assert!(error > 0.0, "re-encode at quality 40 left the pixels untouched");
	}

	#[test]
	fn save_writes_the_encoded_bytes()
	{
		let temp = crate::utils::file_utils::TempFile::new();
		let img = noisy_image(16, 16, 90);
		img.save(temp.path()).expect("temp dir writable");

		let written = fs::read(temp.path()).expect("file exists");
		assert!(jpeg_utils::is_jpeg_data(&written));
	}
}
