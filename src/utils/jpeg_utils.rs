use anyhow::{anyhow, Result};

/// JPEG start-of-image signature bytes.
const JPEG_SIGNATURE: &[u8; 3] = &[0xFF, 0xD8, 0xFF];

/// Standard Annex K luminance quantization table, in raster order.
const STD_LUMA_QUANT: [u16; 64] =
[
	16, 11, 10, 16, 24, 40, 51, 61,
	12, 12, 14, 19, 26, 58, 60, 55,
	14, 13, 16, 24, 40, 57, 69, 56,
	14, 17, 22, 29, 51, 87, 80, 62,
	18, 22, 37, 56, 68, 109, 103, 77,
	24, 35, 55, 64, 81, 104, 113, 92,
	49, 64, 78, 87, 103, 121, 120, 101,
	72, 92, 95, 98, 112, 100, 103, 99,
];

/// Zigzag scan order. Quantization tables are stored in the file in this
/// order; indexing with it converts back to raster order.
const ZIGZAG: [usize; 64] =
[
	0, 1, 8, 16, 9, 2, 3, 10,
	17, 24, 32, 25, 18, 11, 4, 5,
	12, 19, 26, 33, 40, 48, 41, 34,
	27, 20, 13, 6, 7, 14, 21, 28,
	35, 42, 49, 56, 57, 50, 43, 36,
	29, 22, 15, 23, 30, 37, 44, 51,
	58, 59, 52, 45, 38, 31, 39, 46,
	53, 60, 61, 54, 47, 55, 62, 63,
];

/// Checks for the JPEG signature at the start of a byte stream.
pub fn is_jpeg_data(data: &[u8]) -> bool
{
	data.len() >= JPEG_SIGNATURE.len() && &data[..JPEG_SIGNATURE.len()] == JPEG_SIGNATURE
}

/// Estimates the encoding quality (1-100) of a JPEG stream from its
/// luminance quantization table.
///
/// The table values are the Annex K base table scaled by a quality factor;
/// averaging the per-coefficient scale and inverting the scaling formula
/// recovers the quality the encoder was given.
///
/// Returns None if the stream has no readable luminance table.
pub fn estimate_quality(data: &[u8]) -> Option<u32>
{
	let table = find_luma_quant_table(data)?;

	// Mean scale factor relative to the base table, in percent.
	let mut scale_sum: f64 = 0.0;
	for i in 0..64
	{
		scale_sum += (table[i] as f64 * 100.0) / STD_LUMA_QUANT[i] as f64;
	}
	let scale = scale_sum / 64.0;

	// Invert the scaling formula: scale = 5000 / q below 50, 200 - 2q above.
	let quality = if scale <= 100.0
	{
		(200.0 - scale) / 2.0
	}
	else
	{
		5000.0 / scale
	};

	Some(quality.round().clamp(1.0, 100.0) as u32)
}

/// Finds the luminance (table id 0) quantization table in a JPEG stream.
/// Returns the table in raster order.
fn find_luma_quant_table(data: &[u8]) -> Option<[u16; 64]>
{
	if !is_jpeg_data(data)
	{
		return None;
	}

	// Walk the segment list. Every segment starts with a 0xFF marker byte
	// followed by a big-endian payload length that includes the length field.
	let mut pos = 2;
	while pos + 4 <= data.len()
	{
		if data[pos] != 0xFF
		{
			// Not a marker; the stream is damaged.
			return None;
		}

		let marker = data[pos + 1];

		// Standalone markers carry no length field.
		if marker == 0x01 || (0xD0..=0xD7).contains(&marker)
		{
			pos += 2;
			continue;
		}

		// Quantization tables precede the scan; stop once image data starts.
		if marker == 0xDA || marker == 0xD9
		{
			return None;
		}

		let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
		if length < 2 || pos + 2 + length > data.len()
		{
			return None;
		}

		if marker == 0xDB
		{
			// DQT payload: one or more entries of a precision/id byte
			// followed by 64 table values in zigzag order.
			let end = pos + 2 + length;
			let mut entry = pos + 4;
			while entry < end
			{
				let precision = data[entry] >> 4;
				let id = data[entry] & 0x0F;
				let value_size: usize = if precision == 0 { 1 } else { 2 };
				if entry + 1 + 64 * value_size > end
				{
					return None;
				}

				if id == 0
				{
					let mut table = [0u16; 64];
					for i in 0..64
					{
						let offset = entry + 1 + i * value_size;
						table[ZIGZAG[i]] = if precision == 0
						{
							data[offset] as u16
						}
						else
						{
							u16::from_be_bytes([data[offset], data[offset + 1]])
						};
					}
					return Some(table);
				}

				entry += 1 + 64 * value_size;
			}
		}

		pos += 2 + length;
	}

	None
}

/// Removes ancillary metadata segments from a JPEG stream: application
/// segments other than the JFIF header (EXIF, ICC profiles, thumbnails)
/// and comments. The compressed image data is copied through untouched.
pub fn strip_markers(data: &[u8]) -> Result<Vec<u8>>
{
	if !is_jpeg_data(data)
	{
		return Err(anyhow!("Invalid JPEG signature"));
	}

	let mut result: Vec<u8> = Vec::with_capacity(data.len());
	result.extend_from_slice(&data[..2]);

	let mut pos = 2;
	while pos + 2 <= data.len()
	{
		if data[pos] != 0xFF
		{
			return Err(anyhow!("Invalid JPEG segment marker"));
		}

		let marker = data[pos + 1];

		// Standalone markers have no payload.
		if marker == 0x01 || (0xD0..=0xD7).contains(&marker)
		{
			result.extend_from_slice(&data[pos..pos + 2]);
			pos += 2;
			continue;
		}

		// Start of scan: everything from here on is entropy-coded image data.
		if marker == 0xDA
		{
			result.extend_from_slice(&data[pos..]);
			return Ok(result);
		}

		// End of image; nothing left to filter.
		if marker == 0xD9
		{
			result.extend_from_slice(&data[pos..pos + 2]);
			return Ok(result);
		}

		if pos + 4 > data.len()
		{
			return Err(anyhow!("Truncated JPEG segment"));
		}

		let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
		if length < 2 || pos + 2 + length > data.len()
		{
			return Err(anyhow!("Invalid JPEG segment length"));
		}

		// Keep the JFIF header so the file stays well formed; drop the other
		// application segments and comments.
		let keep = match marker
		{
			0xE1..=0xEF | 0xFE => false,
			_ => true,
		};

		if keep
		{
			result.extend_from_slice(&data[pos..pos + 2 + length]);
		}

		pos += 2 + length;
	}

	Ok(result)
}
