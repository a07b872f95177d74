use anyhow::Result;

use crate::codec::ImageHandle;

/// Measured distortion of a candidate encoding relative to its source.
#[derive(Debug, Clone, Copy)]
pub struct DistortionSample
{
	/// Percentage-scaled root-mean-square pixel error against the source.
	pub pixel_error: f64,

	/// Relative change in unique-color density against the source.
	pub density_ratio: f64,
}

/// Unique colors per pixel. A cheap proxy for perceptual complexity:
/// heavier quantization collapses nearby colors and pulls this down.
pub fn color_density<I: ImageHandle>(image: &I) -> f64
{
	image.color_count() as f64 / (image.width() as f64 * image.height() as f64)
}

/// Compares a candidate encoding against its source image.
///
/// `original_density` is the source's color density, computed once at search
/// start so every candidate is measured against the same reference.
pub fn measure<I: ImageHandle>(source: &I, candidate: &I, original_density: f64) -> Result<DistortionSample>
{
	// Whole-image statistical comparison, scaled to a percentage magnitude.
	let pixel_error = source.compare_rmse(candidate)? * 100.0;

	// How far the candidate's color density moved from the source's.
	let density = color_density(candidate);
	let density_ratio = (density - original_density).abs() / original_density;

	Ok(DistortionSample
	{
		pixel_error,
		density_ratio,
	})
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::codec::{ChromaSubsampling, ColorMode};
	use std::path::Path;

	/// Minimal synthetic image: fixed attributes, canned comparison error.
	struct StubImage
	{
		colors: u64,
		width: u32,
		height: u32,
		rmse: f64,
	}

	impl ImageHandle for StubImage
	{
		fn quality(&self) -> u32
		{
			90
		}

		fn color_count(&self) -> u64
		{
			self.colors
		}

		fn width(&self) -> u32
		{
			self.width
		}

		fn height(&self) -> u32
		{
			self.height
		}

		fn color_mode(&self) -> ColorMode
		{
			ColorMode::Color
		}

		fn reencode(&self, _quality: u32) -> Result<Self>
		{
			unreachable!("the evaluator never re-encodes")
		}

		fn compare_rmse(&self, other: &Self) -> Result<f64>
		{
			Ok(other.rmse)
		}

		fn set_chroma_subsampling(&mut self, _subsampling: ChromaSubsampling)
		{
		}

		fn strip_metadata(&mut self)
		{
		}

		fn save(&self, _path: &Path) -> Result<()>
		{
			Ok(())
		}
	}

	#[test]
	fn density_is_colors_per_pixel()
	{
		let image = StubImage { colors: 50000, width: 100, height: 100, rmse: 0.0 };
		assert_eq!(color_density(&image), 5.0);
	}

	#[test]
	fn pixel_error_is_percentage_scaled()
	{
		let source = StubImage { colors: 50000, width: 100, height: 100, rmse: 0.0 };
		let candidate = StubImage { colors: 50000, width: 100, height: 100, rmse: 0.0125 };

		let sample = measure(&source, &candidate, 5.0).expect("comparison succeeds");
		assert!((sample.pixel_error - 1.25).abs() < 1e-9);
		assert_eq!(sample.density_ratio, 0.0);
	}

	#[test]
	fn density_ratio_is_the_relative_change()
	{
		let source = StubImage { colors: 50000, width: 100, height: 100, rmse: 0.0 };
		let candidate = StubImage { colors: 40000, width: 100, height: 100, rmse: 0.0 };

		// Density moved from 5.0 to 4.0, a 20% relative change.
		let sample = measure(&source, &candidate, 5.0).expect("comparison succeeds");
		assert!((sample.density_ratio - 0.2).abs() < 1e-9);
	}

	#[test]
	fn density_ratio_counts_growth_too()
	{
		let source = StubImage { colors: 40000, width: 100, height: 100, rmse: 0.0 };
		let candidate = StubImage { colors: 50000, width: 100, height: 100, rmse: 0.0 };

		let sample = measure(&source, &candidate, 4.0).expect("comparison succeeds");
		assert!((sample.density_ratio - 0.25).abs() < 1e-9);
	}
}
