use std::env;
use std::path::PathBuf;
use anyhow::{anyhow, Result};

use crate::utils::file_utils::is_jpeg_file;

/// Usage line shown for argument errors.
const USAGE: &str = "Usage: minijpeg <source.jpg> <target.jpg>";

#[derive(Debug)]
pub struct Args
{
	/// JPEG file to read.
	pub source: PathBuf,

	/// Path the minified result is written to.
	pub target: PathBuf,
}

impl Args
{
	/// Parse command line arguments and return an Args struct.
	pub fn parse() -> Result<Self>
	{
		// Skip the program name (first argument).
		let cli_args: Vec<String> = env::args().skip(1).collect();

		// Program information requests take precedence over positionals.
		for arg in &cli_args
		{
			match arg.as_str()
			{
				"--help" | "-h" =>
				{
					println!("{} - {}", env!("CARGO_PKG_DESCRIPTION"), env!("CARGO_PKG_VERSION"));
					println!("By {}", env!("CARGO_PKG_AUTHORS"));
					println!("\n{}", USAGE);
					println!("\nFinds the lowest encoding quality that keeps the image");
					println!("perceptually indistinguishable from the original, then writes");
					println!("the re-encoded result. The output is never larger than the input.");
					println!("\nOPTIONS:");
					println!("    -h, --help                   Show help information");
					println!("    -V, --version                Display version information");

					std::process::exit(0);
				}
				"--version" | "-V" =>
				{
					println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
					std::process::exit(0);
				}
				_ => {}
			}
		}

		// Exactly one source and one target path.
		if cli_args.len() != 2
		{
			return Err(anyhow!("{}", USAGE));
		}

		Ok(Args
		{
			source: PathBuf::from(&cli_args[0]),
			target: PathBuf::from(&cli_args[1]),
		})
	}

	/// Validate parameter values before any processing happens.
	/// Returns Ok(()) if all parameters are valid, otherwise returns an error.
	pub fn validate(&self) -> Result<()>
	{
		// The source must exist before any work happens.
		if !self.source.is_file()
		{
			return Err(anyhow!("Source file '{}' does not exist.", self.source.display()));
		}

		// Both ends of the pipeline are JPEG files.
		if !is_jpeg_file(&self.source)
		{
			return Err(anyhow!("Input '{}' is not a JPEG file.", self.source.display()));
		}

		if !is_jpeg_file(&self.target)
		{
			return Err(anyhow!("Target '{}' is not a JPEG file.", self.target.display()));
		}

		// All validations passed.
		Ok(())
	}
}
