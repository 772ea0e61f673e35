//! Read color samples from a raw, interleaved RGB pixel buffer

use crate::Error;
use image::RgbImage;

/// Number of interleaved channels per pixel
pub const CHANNELS: usize = 3;

/// A borrowed view over row-major, channel-interleaved RGB bytes
///
/// The buffer can come from anywhere: a decoded image file, an in-memory bitmap, or a test fixture.
#[derive(Debug, Clone, Copy)]
pub struct RawPixels<'a> {
	/// Pixel bytes, `CHANNELS` per pixel
	data: &'a [u8],
	/// Width in pixels
	width: u32,
	/// Height in pixels
	height: u32,
}

impl<'a> RawPixels<'a> {
	/// Wrap a pixel buffer of the given dimensions.
	///
	/// # Errors
	/// Returns [`Error::EmptyImage`] if either dimension is zero,
	/// or [`Error::BufferSize`] if `data` does not hold exactly `width * height` pixels.
	pub fn new(data: &'a [u8], width: u32, height: u32) -> Result<Self, Error> {
		if width == 0 || height == 0 {
			return Err(Error::EmptyImage { width, height });
		}

		// u64 so that this cannot overflow on 32-bit targets
		let expected = u64::from(width) * u64::from(height) * CHANNELS as u64;
		if data.len() as u64 != expected {
			return Err(Error::BufferSize { expected, actual: data.len() });
		}

		Ok(Self { data, width, height })
	}

	/// Borrow the pixels of a decoded [`RgbImage`].
	///
	/// # Errors
	/// Returns [`Error::EmptyImage`] for an image with no pixels.
	pub fn from_rgb_image(image: &'a RgbImage) -> Result<Self, Error> {
		Self::new(image.as_raw(), image.width(), image.height())
	}

	/// Width in pixels
	#[must_use]
	pub const fn width(&self) -> u32 {
		self.width
	}

	/// Height in pixels
	#[must_use]
	pub const fn height(&self) -> u32 {
		self.height
	}

	/// The number of pixels, `width * height`
	#[must_use]
	pub const fn len(&self) -> usize {
		self.data.len() / CHANNELS
	}

	/// Always `false`, since construction rejects empty images
	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	/// Byte offset of the pixel at (`x`, `y`). Does not check bounds.
	#[must_use]
	pub const fn offset(&self, x: u32, y: u32) -> usize {
		(y as usize * self.width as usize + x as usize) * CHANNELS
	}

	/// The sample at the 0-indexed coordinates (`x`, `y`).
	///
	/// # Panics
	/// Coordinates are not validated. Reading past the end of the buffer panics,
	/// while an `x` past the row width reads from a following row.
	#[must_use]
	pub fn sample_at(&self, x: u32, y: u32) -> [u8; CHANNELS] {
		let offset = self.offset(x, y);
		[self.data[offset], self.data[offset + 1], self.data[offset + 2]]
	}

	/// The sample at a linear, row-major pixel index.
	///
	/// This is the pixel at `y = index / width` and `x = index - y * width`.
	///
	/// # Panics
	/// Panics if `index >= self.len()`.
	#[must_use]
	pub fn sample_at_index(&self, index: usize) -> [u8; CHANNELS] {
		// Saturates to an offset no slice can reach, so huge indices still panic
		let offset = index.saturating_mul(CHANNELS);
		[self.data[offset], self.data[offset + 1], self.data[offset + 2]]
	}

	/// All samples in row-major order
	pub fn samples(&self) -> impl ExactSizeIterator<Item = [u8; CHANNELS]> + 'a {
		let data = self.data;
		data.chunks_exact(CHANNELS).map(|p| [p[0], p[1], p[2]])
	}
}
