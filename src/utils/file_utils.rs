use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Size of a file in bytes.
pub fn file_size(path: &Path) -> Result<u64>
{
	let metadata = fs::metadata(path)
		.map_err(|e| anyhow!("Failed to get file metadata for '{}': {}", path.display(), e))?;

	Ok(metadata.len())
}

/// Byte-for-byte copy from source to target.
pub fn copy_file(source: &Path, target: &Path) -> Result<()>
{
	fs::copy(source, target)
		.map_err(|e| anyhow!("Failed to copy '{}' to '{}': {}", source.display(), target.display(), e))?;

	Ok(())
}

/// Checks if a file is a JPEG file by its extension.
pub fn is_jpeg_file(path: &Path) -> bool
{
	path.extension()
		.map(|ext|
		{
			let ext = ext.to_string_lossy().to_lowercase();
			ext == "jpg" || ext == "jpeg"
		})
		.unwrap_or(false)
}

/// Counter making temporary file names unique within one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A unique path in the system temporary directory, removed on drop.
pub struct TempFile
{
	path: PathBuf,
}

impl TempFile
{
	/// Reserve a fresh temporary file path.
	pub fn new() -> Self
	{
		let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
		let name = format!("minijpeg-{}-{}.tmp", std::process::id(), counter);

		TempFile
		{
			path: std::env::temp_dir().join(name),
		}
	}

	/// The reserved path.
	pub fn path(&self) -> &Path
	{
		&self.path
	}
}

impl Drop for TempFile
{
	fn drop(&mut self)
	{
		let _ = fs::remove_file(&self.path);
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn jpeg_extension_detection()
	{
		assert!(is_jpeg_file(Path::new("photo.jpg")));
		assert!(is_jpeg_file(Path::new("photo.JPEG")));
		assert!(!is_jpeg_file(Path::new("photo.png")));
		assert!(!is_jpeg_file(Path::new("photo")));
	}

	#[test]
	fn temp_files_are_unique_and_removed()
	{
		let first = TempFile::new();
		let second = TempFile::new();
		assert_ne!(first.path(), second.path());

		let kept_path = first.path().to_path_buf();
		fs::write(first.path(), b"scratch").expect("temp dir writable");
		drop(first);
		assert!(!kept_path.exists());
	}

	#[test]
	fn file_size_reports_bytes()
	{
		let temp = TempFile::new();
		fs::write(temp.path(), b"12345").expect("temp dir writable");
		assert_eq!(file_size(temp.path()).expect("file exists"), 5);
	}

	#[test]
	fn file_size_fails_for_missing_files()
	{
		assert!(file_size(Path::new("/no/such/minijpeg/file.jpg")).is_err());
	}
}
