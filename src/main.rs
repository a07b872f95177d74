use anyhow::Result;

mod codec;
mod distortion;
mod minify;
mod search;
mod utils
{
	pub mod arg_utils;
	pub mod file_utils;
	pub mod jpeg_utils;
}
use minify::{minify_jpeg, ProcessingResult};
use search::Thresholds;
use utils::arg_utils::Args;

/// Minify JPEG files with imperceptible quality loss.
fn main() -> Result<()>
{
	// Parse command line arguments.
	let args = Args::parse()?;

	// Validate parameters using the centralized validation method.
	args.validate()?;

	// All tunables are compiled-in defaults; one image per invocation.
	let thresholds = Thresholds::default();
	let result = minify_jpeg(&args.source, &args.target, &thresholds)?;

	print_report(&result);

	Ok(())
}

/// Print the before/after summary with one token per search probe.
fn print_report(result: &ProcessingResult)
{
	let before = &result.before;
	println!(
		"Before quality {} colors {} size {} type {} {}x{}",
		before.quality,
		before.colors,
		format_bytes(before.size),
		before.color_mode,
		before.width,
		before.height
	);

	// One token per bisection probe: pixel error / density ratio @ quality.
	if !result.steps.is_empty()
	{
		let tokens: Vec<String> = result.steps.iter()
			.map(|step| format!("{:.2}/{:.2}@{}", step.sample.pixel_error, step.sample.density_ratio, step.quality))
			.collect();
		println!("{}", tokens.join(" "));
	}

	let after = &result.after;
	let saved = before.size.saturating_sub(after.size);
	let saved_pct = if before.size > 0
	{
		(saved as f64 / before.size as f64) * 100.0
	}
	else
	{
		0.0
	};

	println!(
		"After  quality {} colors {} size {} saved {} ({:.1}%)",
		after.quality,
		after.colors,
		format_bytes(after.size),
		format_bytes(saved),
		saved_pct
	);
}

/// Formats file size in human-readable format.
fn format_bytes(size: u64) -> String
{
	if size < 1024
	{
		format!("{} B", size)
	}
	else if size < 1024 * 1024
	{
		format!("{:.1} KB", size as f64 / 1024.0)
	}
	else
	{
		format!("{:.2} MB", size as f64 / (1024.0 * 1024.0))
	}
}
