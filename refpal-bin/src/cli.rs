//! Specifies the CLI and handles arg parsing

use clap::{Parser, ValueEnum};
use std::{
	fmt::Display,
	num::ParseIntError,
	path::PathBuf,
	str::FromStr,
};

/// Supported output formats for the final colors
#[derive(Copy, Clone, ValueEnum)]
pub enum FormatOutput {
	/// sRGB hexcode
	Hex,
	/// sRGB (r,g,b) triple
	Rgb,
	/// Whitespace with true color background
	Swatch,
}

/// Sort orders for the final colors
#[derive(Copy, Clone, ValueEnum)]
pub enum SortOutput {
	/// Ascending hue
	H,
	/// Ascending saturation
	S,
	/// Ascending lightness
	L,
	/// Descending number of pixels
	N,
}

/// Ways to colorize the output text
#[derive(Copy, Clone, ValueEnum)]
pub enum ColorizeOutput {
	/// Foreground
	Fg,
	/// Background
	Bg,
}

/// Extract a palette of dominant colors from each reference photo using k-means clustering.
///
/// The colors of each palette can be assigned to a number of target layers,
/// with layer i receiving color i modulo k.
#[derive(Parser)]
#[command(version)]
pub struct Options {
	/// Reference photos, or directories containing .jpg/.jpeg reference photos
	#[arg(required = true)]
	pub inputs: Vec<PathBuf>,

	/// The number of colors to extract from each photo
	#[arg(short, default_value_t = 5, value_parser = parse_positive::<usize>)]
	pub k: usize,

	/// The side length each photo is resized to before its pixels are sampled
	///
	/// The aspect ratio is not kept. Smaller sizes are faster but blur away small details.
	#[arg(short, long, default_value_t = 75, value_parser = parse_positive::<u32>)]
	pub size: u32,

	/// Also print the color assigned to each of this many target layers
	#[arg(short, long)]
	pub targets: Option<usize>,

	/// The format to print the colors in
	#[arg(short, long, default_value = "hex")]
	pub output: FormatOutput,

	/// Color the foreground or background for each printed color
	#[arg(short, long)]
	pub colorize: Option<ColorizeOutput>,

	/// The order to print the colors in, instead of the order used for target layers
	///
	/// The h, s, and l options below refer to Okhsl component values and not the HSL color space.
	#[arg(long)]
	pub sort: Option<SortOutput>,

	/// Reverse the printed order of the colors
	#[arg(short, long)]
	pub reverse: bool,

	/// The seed value used for the random number generator
	///
	/// Each photo uses this seed combined with its position in the input list.
	#[arg(long, default_value_t = 0)]
	pub seed: u64,

	/// The number of threads used to process photos, 0 picks one per CPU
	///
	/// Has no effect if the threads feature was disabled at build time.
	#[arg(short = 'j', long, default_value_t = 0)]
	pub threads: u8,

	/// Print additional information, such as timings and the number of k-means iterations
	#[arg(long)]
	pub verbose: bool,
}

/// Parse an integer and ensure it is at least 1
fn parse_positive<T>(s: &str) -> Result<T, String>
where
	T: FromStr<Err = ParseIntError> + Display + PartialOrd + From<u8>,
{
	let value: T = s.parse().map_err(|e| format!("{e}"))?;
	if value >= T::from(1) {
		Ok(value)
	} else {
		Err(format!("{value} is not at least 1"))
	}
}
