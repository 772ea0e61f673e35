//! Extract a small palette of dominant colors from raw RGB pixels using k-means clustering.
//!
//! The palette is meant for recoloring flat-color illustration layers after a reference photo:
//! each target region `i` receives the color [`KmeansResult::color_for`]`(i)`, cycling through the palette.
//!
//! # Examples
//!
//! ## Read an image file and get 5 dominant colors.
//!
//! ```no_run
//! let image = image::open("some image").unwrap().into_rgb8();
//! let pixels = refpal::RawPixels::from_rgb_image(&image).unwrap();
//! let result = refpal::from_pixels(&pixels, 5, 0).unwrap();
//! println!("{:?}", result.palette);
//! ```
//!
//! ## Provide your own samples and random source.
//!
//! ```
//! use rand::SeedableRng;
//!
//! let mut samples = vec![[0, 0, 0]; 50];
//! samples.extend([[255, 255, 255]; 50]);
//!
//! let mut rng = rand_xoshiro::Xoroshiro128PlusPlus::seed_from_u64(42);
//! let result = refpal::kmeans::run(&samples, 2, &mut rng).unwrap();
//! assert_eq!(result.palette.len(), 2);
//! ```
//!
//! # Algorithm
//!
//! Distances are plain Euclidean distances over the raw channel values; no color space conversion is done.
//! Starting centroids are drawn at random from the samples. Each iteration assigns every sample to its
//! nearest centroid (ties go to the lowest index), gives any empty cluster a random sample,
//! and moves each centroid to the mean of its cluster. A run stops once an assignment pass reproduces
//! the previous partition exactly, or after [`kmeans::MAX_ITERATIONS`] passes, in which case the current
//! centroids are returned as is. Centroids are only rounded to integers at the very end.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::cargo)]
#![warn(clippy::use_debug, clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![warn(clippy::unwrap_used, clippy::unwrap_in_result)]
#![warn(clippy::unneeded_field_pattern, clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::str_to_string, clippy::string_to_string, clippy::string_slice)]
#![warn(missing_docs, clippy::missing_docs_in_private_items, rustdoc::all)]
#![warn(clippy::float_cmp_const, clippy::lossy_float_literal)]
#![allow(clippy::module_name_repetitions)]

use rand::SeedableRng;
use std::fmt::{self, Display};

pub mod kmeans;
pub use kmeans::KmeansResult;

mod sampler;
pub use sampler::{RawPixels, CHANNELS};

/// Error cases for sampling pixels and configuring k-means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// `k` was `0` or greater than the number of samples
	InvalidK {
		/// The requested palette size
		k: usize,
		/// The number of available samples
		samples: usize,
	},
	/// The image had a zero width or height
	EmptyImage {
		/// Width in pixels
		width: u32,
		/// Height in pixels
		height: u32,
	},
	/// The pixel buffer length did not match the image dimensions
	BufferSize {
		/// `width * height * CHANNELS`
		expected: u64,
		/// The actual buffer length
		actual: usize,
	},
}

impl Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::InvalidK { k, samples } => {
				write!(f, "Cannot find {k} colors in {samples} samples, k must be in 1..={samples}")
			},
			Error::EmptyImage { width, height } => write!(f, "The image has no pixels ({width}x{height})"),
			Error::BufferSize { expected, actual } => {
				write!(f, "Expected {expected} bytes of pixel data but got {actual}")
			},
		}
	}
}

impl std::error::Error for Error {}

/// Runs k-means on every pixel of `pixels`, seeding the random number generator with `seed`.
///
/// # Errors
/// Returns [`Error::InvalidK`] if `k` is `0` or greater than the number of pixels.
pub fn from_pixels(pixels: &RawPixels, k: usize, seed: u64) -> Result<KmeansResult<CHANNELS>, Error> {
	let samples = pixels.samples().collect::<Vec<_>>();
	let mut rng = rand_xoshiro::Xoroshiro128PlusPlus::seed_from_u64(seed);
	kmeans::run(&samples, k, &mut rng)
}
