use anyhow::Result;

use crate::codec::{ColorMode, ImageHandle};
use crate::distortion::{self, DistortionSample};

/// Tunables for the adaptive quality search.
///
/// Held immutable for a whole run and passed in explicitly, so nothing in
/// the search depends on process-wide state.
#[derive(Debug, Clone)]
pub struct Thresholds
{
	/// Largest percentage-scaled pixel error a candidate may show.
	pub error_threshold: f64,

	/// Largest relative change in unique-color density a candidate may show.
	pub color_density_ratio: f64,

	/// Images with fewer unique colors than this are left untouched.
	pub min_unique_colors: u64,

	/// Ceiling of the output quality window.
	pub quality_out_max: u32,

	/// Floor of the output quality window.
	pub quality_out_min: u32,

	/// Sources already encoded below this quality are presumed hand-tuned.
	pub quality_in_min: u32,

	/// Bisection step budget; the window is never wider than its square.
	pub max_steps: u32,
}

impl Default for Thresholds
{
	fn default() -> Self
	{
		Thresholds
		{
			error_threshold: 1.0,
			color_density_ratio: 0.11,
			min_unique_colors: 4096,
			quality_out_max: 95,
			quality_out_min: 70,
			quality_in_min: 82,
			max_steps: 5,
		}
	}
}

/// Integer quality window bounding the bisection, recomputed once per image.
#[derive(Debug, Clone, Copy)]
pub struct SearchBounds
{
	pub qmin: u32,
	pub qmax: u32,
}

impl SearchBounds
{
	/// Computes the quality window for one image.
	///
	/// The ceiling never exceeds the source's own quality (re-encoding above
	/// it cannot help), and the floor stays within the step budget of the
	/// ceiling so the bisection terminates in a known number of probes.
	pub fn for_quality(source_quality: u32, thresholds: &Thresholds) -> Self
	{
		let qmax = source_quality.min(thresholds.quality_out_max);
		let qmin = qmax
			.saturating_sub(thresholds.max_steps * thresholds.max_steps)
			.max(thresholds.quality_out_min)
			.min(qmax);

		SearchBounds { qmin, qmax }
	}
}

/// One bisection probe, kept for progress reporting.
#[derive(Debug, Clone, Copy)]
pub struct SearchStep
{
	/// Quality the candidate was encoded at.
	pub quality: u32,

	/// Distortion measured against the source.
	pub sample: DistortionSample,
}

/// Terminal state of the quality search for one image.
pub enum SearchOutcome
{
	/// Too few unique colors; quantization banding would be visible, so the
	/// source is returned untouched.
	SkippedLowColor,

	/// The source quality is low enough that somebody already tuned it;
	/// their judgment stands.
	SkippedAlreadyTuned,

	/// The bisection converged on a final quality.
	Converged
	{
		/// The lowest acceptable quality found.
		quality: u32,

		/// Every probe taken, in order.
		steps: Vec<SearchStep>,
	},
}

/// Finds the lowest quality at which a re-encoding of `source` stays
/// perceptually indistinguishable from it.
///
/// Bisects the quality window: a candidate whose distortion exceeds either
/// threshold raises the floor, an acceptable candidate lowers the ceiling.
/// Acceptable candidates shrinking the window from the top is what biases
/// the result toward the smallest acceptable quality.
pub fn find_minimal_quality<I: ImageHandle>(source: &I, bounds: SearchBounds, thresholds: &Thresholds) -> Result<SearchOutcome>
{
	// Low-color images (gradients, flat graphics, text) band badly under
	// heavier quantization. Grayscale images are exempt: their color count
	// is capped by the bit depth, not by visual simplicity.
	if source.color_count() < thresholds.min_unique_colors && source.color_mode() != ColorMode::Grayscale
	{
		return Ok(SearchOutcome::SkippedLowColor);
	}

	if source.quality() < thresholds.quality_in_min
	{
		return Ok(SearchOutcome::SkippedAlreadyTuned);
	}

	let original_density = distortion::color_density(source);
	let mut qmin = bounds.qmin;
	let mut qmax = bounds.qmax;
	let mut steps: Vec<SearchStep> = Vec::new();

	while qmax > qmin + 2
	{
		let quality = (qmax + qmin) / 2;

		// Every candidate derives from the source, never from an earlier
		// candidate, so encoding loss cannot compound across probes. The
		// candidate is dropped once measured.
		let candidate = source.reencode(quality)?;
		let sample = distortion::measure(source, &candidate, original_density)?;

		if sample.pixel_error > thresholds.error_threshold || sample.density_ratio > thresholds.color_density_ratio
		{
			// Too distorted; raise the floor.
			qmin = quality;
		}
		else
		{
			// Acceptable; lower the ceiling.
			qmax = quality;
		}

		steps.push(SearchStep { quality, sample });
	}

	// Quality is an integer codec parameter; the midpoint floors.
	let quality = (qmax + qmin) / 2;

	Ok(SearchOutcome::Converged { quality, steps })
}
