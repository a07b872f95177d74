use anyhow::Result;

use crate::codec::{ChromaSubsampling, ColorMode, ImageHandle, JpegImage};
use crate::search::{self, SearchBounds, SearchOutcome, SearchStep, Thresholds};
use crate::utils::file_utils;

use std::path::Path;

/// Attributes of an image at one end of the pipeline, for reporting.
#[derive(Debug, Clone)]
pub struct ImageStats
{
	pub quality: u32,
	pub colors: u64,
	pub size: u64,
	pub width: u32,
	pub height: u32,
	pub color_mode: ColorMode,
}

impl ImageStats
{
	/// Capture the reportable attributes of a loaded image.
	fn capture(image: &JpegImage, size: u64) -> Self
	{
		ImageStats
		{
			quality: image.quality(),
			colors: image.color_count(),
			size,
			width: image.width(),
			height: image.height(),
			color_mode: image.color_mode(),
		}
	}
}

/// Results of minifying one JPEG file.
pub struct ProcessingResult
{
	/// The source image as loaded.
	pub before: ImageStats,

	/// The image that ended up at the target path.
	pub after: ImageStats,

	/// Bisection probes taken; empty when the search was skipped.
	pub steps: Vec<SearchStep>,
}

/// Minifies a JPEG file by searching for the lowest quality that keeps it
/// perceptually indistinguishable from the original.
///
/// The output is never larger than the input: when the search is skipped or
/// re-encoding failed to shrink the file, the original bytes are copied to
/// the target unchanged and the result describes an untouched image.
pub fn minify_jpeg(source_path: &Path, target_path: &Path, thresholds: &Thresholds) -> Result<ProcessingResult>
{
	let original_size = file_utils::file_size(source_path)?;
	let source = JpegImage::load(source_path)?;
	let before = ImageStats::capture(&source, original_size);

	let bounds = SearchBounds::for_quality(source.quality(), thresholds);
	let outcome = search::find_minimal_quality(&source, bounds, thresholds)?;

	let (quality, steps) = match outcome
	{
		SearchOutcome::SkippedLowColor | SearchOutcome::SkippedAlreadyTuned =>
		{
			// Valid terminal outcome, not an error: pass the file through.
			keep_original(source_path, target_path)?;

			return Ok(ProcessingResult
			{
				after: before.clone(),
				before,
				steps: Vec::new(),
			});
		}
		SearchOutcome::Converged { quality, steps } => (quality, steps),
	};

	// The winning quality is re-encoded once more from the source with the
	// output encoding configuration: quarter-resolution chroma and no
	// ancillary metadata.
	let mut output_source = source;
	output_source.set_chroma_subsampling(ChromaSubsampling::Quarter);
	output_source.strip_metadata();

	let output = output_source.reencode(quality)?;
	output.save(target_path)?;

	let new_size = file_utils::file_size(target_path)?;
	if new_size > original_size
	{
		// Re-encoding did not shrink the file; keep the original bytes.
		keep_original(source_path, target_path)?;

		return Ok(ProcessingResult
		{
			after: before.clone(),
			before,
			steps,
		});
	}

	let after = ImageStats::capture(&output, new_size);

	Ok(ProcessingResult
	{
		before,
		after,
		steps,
	})
}

/// Places the unmodified original at the target path.
fn keep_original(source_path: &Path, target_path: &Path) -> Result<()>
{
	if source_path != target_path
	{
		file_utils::copy_file(source_path, target_path)?;
	}

	Ok(())
}
