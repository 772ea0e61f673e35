//! Extract dominant color palettes from reference photos for recoloring flat illustration layers.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
	clippy::pedantic,
	clippy::cargo,
	clippy::use_debug,
	clippy::dbg_macro,
	clippy::todo,
	clippy::unimplemented,
	clippy::unwrap_used,
	clippy::unwrap_in_result,
	clippy::unneeded_field_pattern,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::unnecessary_self_imports,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::string_slice,
	missing_docs,
	clippy::missing_docs_in_private_items,
	rustdoc::all,
	clippy::float_cmp_const,
	clippy::lossy_float_literal
)]
#![allow(clippy::doc_markdown, clippy::module_name_repetitions, clippy::many_single_char_names)]

mod cli;

#[allow(clippy::wildcard_imports)]
use cli::*;

use std::{
	ffi::OsStr,
	fmt::{self, Display},
	fs, io,
	path::{Path, PathBuf},
	process::ExitCode,
	time::Instant,
};

use clap::Parser;
use colored::Colorize;
use image::imageops::FilterType;
use log::{info, LevelFilter};
use palette::{FromColor, LinSrgb, Okhsl, Oklab, Srgb};
use refpal::{KmeansResult, RawPixels, CHANNELS};

/// Record the running time of an expression and log the elapsed time
macro_rules! time {
	($name: literal, $func_call: expr) => {{
		let start = Instant::now();
		let result = $func_call;
		info!("{} took {}ms", $name, start.elapsed().as_millis());
		result
	}};
}

/// Error cases for finding, loading, and processing reference photos
#[derive(Debug)]
enum RunError {
	/// Failed to list the contents of an input directory
	ReadDir(PathBuf, io::Error),
	/// The inputs did not contain any reference photos
	NoImages,
	/// Failed to read or decode a reference photo
	ImageLoad(PathBuf, image::ImageError),
	/// The photo could not be sampled or clustered with the given options
	Palette(PathBuf, refpal::Error),
	/// Failed to start the worker threads
	#[cfg(feature = "threads")]
	ThreadPool(rayon::ThreadPoolBuildError),
}

impl Display for RunError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			RunError::ReadDir(path, e) => write!(f, "Failed to read the directory {}: {e}", path.display()),
			RunError::NoImages => write!(f, "No .jpg or .jpeg reference photos were found"),
			RunError::ImageLoad(path, e) => write!(f, "Failed to load the image file {}: {e}", path.display()),
			RunError::Palette(path, e) => write!(f, "Failed to extract colors from {}: {e}", path.display()),
			#[cfg(feature = "threads")]
			RunError::ThreadPool(e) => write!(f, "Failed to start the thread pool: {e}"),
		}
	}
}

fn main() -> ExitCode {
	let options = Options::parse();
	init_logger(options.verbose);

	let result = run_extract_and_print_palettes(&options);

	// Returning Result<_> uses Debug printing instead of Display
	if let Err(e) = result {
		eprintln!("{e}");
		ExitCode::FAILURE
	} else {
		ExitCode::SUCCESS
	}
}

/// Log warnings by default, or everything down to info with `--verbose`. `RUST_LOG` takes precedence.
fn init_logger(verbose: bool) {
	env_logger::Builder::new()
		.filter_level(if verbose { LevelFilter::Info } else { LevelFilter::Warn })
		.parse_default_env()
		.format_timestamp(None)
		.init();
}

/// Builds a thread pool and then runs `extract_and_print_palettes`
#[cfg(feature = "threads")]
fn run_extract_and_print_palettes(options: &Options) -> Result<(), RunError> {
	let pool = rayon::ThreadPoolBuilder::new()
		.num_threads(usize::from(options.threads))
		.build()
		.map_err(RunError::ThreadPool)?;

	pool.install(|| extract_and_print_palettes(options))
}

/// Runs `extract_and_print_palettes` on a single thread
#[cfg(not(feature = "threads"))]
fn run_extract_and_print_palettes(options: &Options) -> Result<(), RunError> {
	extract_and_print_palettes(options)
}

/// Find the reference photos, extract a palette from each, and print the results in input order
fn extract_and_print_palettes(options: &Options) -> Result<(), RunError> {
	let paths = collect_inputs(&options.inputs)?;
	info!("Found {} reference photos", paths.len());

	let results = time!("Palette extraction", reference_palettes(&paths, options))?;

	for (path, result) in paths.iter().zip(&results) {
		print_palette(path, result, options);
	}

	Ok(())
}

/// Whether the path has a `.jpg` or `.jpeg` extension, ignoring case
fn is_reference_photo(path: &Path) -> bool {
	path.extension()
		.and_then(OsStr::to_str)
		.map_or(false, |ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

/// Expand directories into their sorted reference photos. Other paths are kept as is.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, RunError> {
	let mut paths = Vec::new();
	for input in inputs {
		if input.is_dir() {
			let mut photos = fs::read_dir(input)
				.and_then(|entries| {
					entries
						.map(|entry| entry.map(|entry| entry.path()))
						.collect::<Result<Vec<_>, _>>()
				})
				.map_err(|e| RunError::ReadDir(input.clone(), e))?;

			photos.retain(|path| path.is_file() && is_reference_photo(path));
			photos.sort();
			paths.extend(photos);
		} else {
			paths.push(input.clone());
		}
	}

	if paths.is_empty() {
		Err(RunError::NoImages)
	} else {
		Ok(paths)
	}
}

/// The seed for the photo at `index`, so that results do not depend on which thread runs first
fn image_seed(seed: u64, index: usize) -> u64 {
	seed ^ index as u64
}

/// Load a reference photo, shrink it, and extract its palette
fn reference_palette(path: &Path, options: &Options, seed: u64) -> Result<KmeansResult<CHANNELS>, RunError> {
	let image = time!("Image loading", image::open(path)).map_err(|e| RunError::ImageLoad(path.to_path_buf(), e))?;

	let size = options.size;
	let image = time!(
		"Image resizing",
		image.resize_exact(size, size, FilterType::CatmullRom)
	)
	.into_rgb8();

	let palette_error = |e: refpal::Error| RunError::Palette(path.to_path_buf(), e);
	let pixels = RawPixels::from_rgb_image(&image).map_err(palette_error)?;
	let result = time!("k-means", refpal::from_pixels(&pixels, options.k, seed)).map_err(palette_error)?;

	info!(
		"{}: {} iterations, converged: {}",
		path.display(),
		result.iterations,
		result.converged
	);

	Ok(result)
}

/// Extract the palette of every photo in parallel
#[cfg(feature = "threads")]
fn reference_palettes(paths: &[PathBuf], options: &Options) -> Result<Vec<KmeansResult<CHANNELS>>, RunError> {
	use rayon::prelude::*;

	paths
		.par_iter()
		.enumerate()
		.map(|(i, path)| reference_palette(path, options, image_seed(options.seed, i)))
		.collect()
}

/// Extract the palette of every photo in turn
#[cfg(not(feature = "threads"))]
fn reference_palettes(paths: &[PathBuf], options: &Options) -> Result<Vec<KmeansResult<CHANNELS>>, RunError> {
	paths
		.iter()
		.enumerate()
		.map(|(i, path)| reference_palette(path, options, image_seed(options.seed, i)))
		.collect()
}

/// Convert an [`Srgb`] color to [`Okhsl`]
fn okhsl(color: Srgb<u8>) -> Okhsl {
	let linear: LinSrgb = color.into_linear();
	let oklab: Oklab = Oklab::from_color(linear);
	Okhsl::from_color(oklab)
}

/// The palette colors in the order given by the sort and reverse options
fn sorted_colors(result: &KmeansResult<CHANNELS>, options: &Options) -> Vec<Srgb<u8>> {
	let mut colors = result
		.palette
		.iter()
		.zip(&result.counts)
		.map(|(&[r, g, b], &count)| {
			let srgb = Srgb::new(r, g, b);
			(srgb, okhsl(srgb), count)
		})
		.collect::<Vec<_>>();

	match options.sort {
		Some(SortOutput::H) => colors.sort_by(|(_, x, _), (_, y, _)| {
			f32::total_cmp(&x.hue.into_positive_degrees(), &y.hue.into_positive_degrees())
		}),
		Some(SortOutput::S) => colors.sort_by(|(_, x, _), (_, y, _)| f32::total_cmp(&x.saturation, &y.saturation)),
		Some(SortOutput::L) => colors.sort_by(|(_, x, _), (_, y, _)| f32::total_cmp(&x.lightness, &y.lightness)),
		Some(SortOutput::N) => colors.sort_by_key(|&(_, _, count)| std::cmp::Reverse(count)),
		None => (),
	}

	if options.reverse {
		colors.reverse();
	}

	colors.into_iter().map(|(color, _, _)| color).collect()
}

/// Format and colorize the text for a single color
fn format_color(color: Srgb<u8>, options: &Options) -> String {
	let text = match options.output {
		FormatOutput::Hex => format!("{color:X}"),
		FormatOutput::Rgb => format!("({},{},{})", color.red, color.green, color.blue),
		FormatOutput::Swatch => return "   ".on_truecolor(color.red, color.green, color.blue).to_string(),
	};

	match options.colorize {
		Some(ColorizeOutput::Fg) => text.truecolor(color.red, color.green, color.blue).to_string(),
		Some(ColorizeOutput::Bg) => text.on_truecolor(color.red, color.green, color.blue).to_string(),
		None => text,
	}
}

/// Format a line of colors
fn format_colors(colors: &[Srgb<u8>], options: &Options) -> String {
	let delimiter = if matches!(options.output, FormatOutput::Swatch) { "" } else { " " };
	colors
		.iter()
		.map(|&color| format_color(color, options))
		.collect::<Vec<_>>()
		.join(delimiter)
}

/// The colors assigned to each target layer, cycling through the palette
fn target_colors(result: &KmeansResult<CHANNELS>, targets: usize) -> Vec<Srgb<u8>> {
	(0..targets)
		.map(|i| {
			let [r, g, b] = result.color_for(i);
			Srgb::new(r, g, b)
		})
		.collect()
}

/// Print the palette of one photo, followed by the color of each target layer if requested
fn print_palette(path: &Path, result: &KmeansResult<CHANNELS>, options: &Options) {
	let name = path
		.file_name()
		.map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());

	println!("{name}: {}", format_colors(&sorted_colors(result, options), options));

	if let Some(targets) = options.targets {
		for (i, color) in target_colors(result, targets).into_iter().enumerate() {
			println!("  layer {i}: {}", format_color(color, options));
		}
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;

	fn options(args: &[&str]) -> Options {
		Options::try_parse_from(["refpal"].iter().chain(args)).unwrap()
	}

	fn test_result() -> KmeansResult<CHANNELS> {
		KmeansResult {
			palette: vec![[255, 0, 16], [0, 0, 0], [250, 250, 250]],
			counts: vec![10, 50, 30],
			iterations: 3,
			converged: true,
		}
	}

	#[test]
	fn reference_photos_are_jpegs() {
		assert!(is_reference_photo(Path::new("a.jpg")));
		assert!(is_reference_photo(Path::new("dir/b.JPEG")));
		assert!(!is_reference_photo(Path::new("c.png")));
		assert!(!is_reference_photo(Path::new("jpg")));
	}

	#[test]
	fn directories_expand_to_sorted_photos() {
		let temp_dir = tempfile::tempdir().unwrap();
		let dir = temp_dir.path();
		for name in ["z.jpg", "a.jpeg", "notes.txt", "b.JPG"] {
			fs::write(dir.join(name), b"").unwrap();
		}
		fs::create_dir(dir.join("nested.jpg")).unwrap();

		let explicit = PathBuf::from("explicit.png");
		let paths = collect_inputs(&[dir.to_path_buf(), explicit.clone()]).unwrap();

		assert_eq!(
			paths,
			vec![dir.join("a.jpeg"), dir.join("b.JPG"), dir.join("z.jpg"), explicit]
		);
	}

	#[test]
	fn empty_directory_has_no_images() {
		let temp_dir = tempfile::tempdir().unwrap();
		assert!(matches!(
			collect_inputs(&[temp_dir.path().to_path_buf()]),
			Err(RunError::NoImages)
		));
	}

	#[test]
	fn each_image_gets_its_own_seed() {
		assert_eq!(image_seed(0, 0), 0);
		assert_ne!(image_seed(42, 1), image_seed(42, 2));
	}

	#[test]
	fn unsorted_colors_keep_target_order() {
		let colors = sorted_colors(&test_result(), &options(&["photos"]));
		assert_eq!(colors, vec![Srgb::new(255, 0, 16), Srgb::new(0, 0, 0), Srgb::new(250, 250, 250)]);
	}

	#[test]
	fn sort_by_count_descending() {
		let colors = sorted_colors(&test_result(), &options(&["--sort", "n", "photos"]));
		assert_eq!(colors, vec![Srgb::new(0, 0, 0), Srgb::new(250, 250, 250), Srgb::new(255, 0, 16)]);

		let colors = sorted_colors(&test_result(), &options(&["--sort", "l", "-r", "photos"]));
		assert_eq!(colors[0], Srgb::new(250, 250, 250));
		assert_eq!(colors[2], Srgb::new(0, 0, 0));
	}

	#[test]
	fn formats_hex_and_rgb() {
		let colors = [Srgb::new(255, 0, 16), Srgb::new(1, 2, 3)];
		assert_eq!(format_colors(&colors, &options(&["photos"])), "FF0010 010203");
		assert_eq!(format_colors(&colors, &options(&["-o", "rgb", "photos"])), "(255,0,16) (1,2,3)");
	}

	#[test]
	fn targets_cycle_through_palette() {
		let colors = target_colors(&test_result(), 5);
		assert_eq!(
			colors,
			vec![
				Srgb::new(255, 0, 16),
				Srgb::new(0, 0, 0),
				Srgb::new(250, 250, 250),
				Srgb::new(255, 0, 16),
				Srgb::new(0, 0, 0),
			]
		);
	}

	#[test]
	#[cfg(feature = "png")]
	fn extracts_palette_from_image_file() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("flat.png");
		image::RgbImage::from_pixel(40, 30, image::Rgb([10, 120, 200])).save(&path).unwrap();

		let result = reference_palette(&path, &options(&["-k", "1", "-s", "16", "photos"]), 0).unwrap();

		assert_eq!(result.palette.len(), 1);
		assert_eq!(result.counts, vec![16 * 16]);
		for (&c, expected) in result.palette[0].iter().zip([10, 120, 200]) {
			assert!(c.abs_diff(expected) <= 1, "{c} != {expected}");
		}
	}

	#[test]
	fn missing_image_is_a_load_error() {
		let result = reference_palette(Path::new("does/not/exist.jpg"), &options(&["photos"]), 0);
		assert!(matches!(result, Err(RunError::ImageLoad(..))));
	}

	#[test]
	#[cfg(feature = "png")]
	fn too_many_colors_for_size_is_a_palette_error() {
		let temp_dir = tempfile::tempdir().unwrap();
		let path = temp_dir.path().join("small.png");
		image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0])).save(&path).unwrap();

		let result = reference_palette(&path, &options(&["-k", "5", "-s", "2", "photos"]), 0);
		assert!(matches!(
			result,
			Err(RunError::Palette(_, refpal::Error::InvalidK { k: 5, samples: 4 }))
		));
	}
}
