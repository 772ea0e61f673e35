//! Provides the implementation for k-means over raw channel samples

use crate::Error;
use log::{debug, trace};
use rand::Rng;

/// The maximum number of assignment passes in a single k-means run
pub const MAX_ITERATIONS: u32 = 50;

/// Sample indices grouped by the index of their nearest centroid
type Partition = Vec<Vec<usize>>;

/// Holds all the state used by k-means
struct KmeansState<const N: usize> {
	/// Full precision centroids, rounded only once the run is over
	centroids: Vec<[f64; N]>,
	/// Partition from the current assignment pass
	clusters: Partition,
	/// Partition from the previous assignment pass
	previous: Partition,
}

impl<const N: usize> KmeansState<N> {
	/// Initialize a new [`KmeansState`] with `k` centers
	fn new(k: usize) -> Self {
		Self {
			centroids: Vec::with_capacity(k),
			clusters: vec![Vec::new(); k],
			// Cannot match the first pass, since at least one sample is always assigned
			previous: vec![Vec::new(); k],
		}
	}
}

/// Result from running k-means
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmeansResult<const N: usize> {
	/// Final centroids rounded to the nearest integer, in centroid index order
	pub palette: Vec<[u8; N]>,
	/// Number of samples nearest to each palette color in the last assignment pass
	///
	/// A count can be `0` if the run stopped at the iteration cap right after a cluster emptied.
	pub counts: Vec<usize>,
	/// Number of elapsed assignment passes
	pub iterations: u32,
	/// Whether the last pass reproduced the previous partition before the iteration cap
	pub converged: bool,
}

impl<const N: usize> KmeansResult<N> {
	/// The palette color for the `target`th downstream region, cycling through the palette.
	#[must_use]
	pub fn color_for(&self, target: usize) -> [u8; N] {
		self.palette[target % self.palette.len()]
	}
}

/// Widen a sample to full precision
fn to_point<const N: usize>(sample: [u8; N]) -> [f64; N] {
	sample.map(f64::from)
}

/// Euclidean distance between two points
fn distance<const N: usize>(x: &[f64; N], y: &[f64; N]) -> f64 {
	x.iter()
		.zip(y)
		.map(|(a, b)| {
			let d = b - a;
			d * d
		})
		.sum::<f64>()
		.sqrt()
}

/// Index of the centroid closest to `point`, preferring the lowest index on ties
fn nearest_centroid<const N: usize>(point: &[f64; N], centroids: &[[f64; N]]) -> usize {
	let mut min_center = 0;
	let mut min_dist = distance(point, &centroids[0]);
	for (i, centroid) in centroids.iter().enumerate().skip(1) {
		let dist = distance(point, centroid);
		if dist < min_dist {
			min_dist = dist;
			min_center = i;
		}
	}
	min_center
}

/// Pick `k` starting centroids uniformly at random, with replacement
fn initial_centroids<const N: usize>(
	k: usize,
	rng: &mut impl Rng,
	samples: &[[u8; N]],
	centroids: &mut Vec<[f64; N]>,
) {
	centroids.clear();
	for _ in 0..k {
		centroids.push(to_point(samples[rng.gen_range(0..samples.len())]));
	}
}

/// Assign every sample to the cluster of its nearest centroid
fn update_assignments<const N: usize>(samples: &[[u8; N]], centroids: &[[f64; N]], clusters: &mut Partition) {
	for cluster in &mut *clusters {
		cluster.clear();
	}

	for (i, &sample) in samples.iter().enumerate() {
		clusters[nearest_centroid(&to_point(sample), centroids)].push(i);
	}
}

/// Per channel mean of the given samples
#[allow(clippy::cast_precision_loss)]
fn mean<const N: usize>(samples: &[[u8; N]], members: &[usize]) -> [f64; N] {
	let mut sum = [0.0; N];
	for &i in members {
		for (s, &c) in sum.iter_mut().zip(&samples[i]) {
			*s += f64::from(c);
		}
	}

	// members.len() is at most the number of pixels in an image, well within f64's exact integer range
	let n = members.len() as f64;
	sum.map(|s| s / n)
}

/// Give each empty cluster one sample drawn uniformly at random from all samples,
/// returning the number of clusters that were repaired.
fn repair_empty_clusters(rng: &mut impl Rng, num_samples: usize, clusters: &mut Partition) -> usize {
	let mut repaired = 0;
	for cluster in clusters.iter_mut().filter(|cluster| cluster.is_empty()) {
		cluster.push(rng.gen_range(0..num_samples));
		repaired += 1;
	}
	repaired
}

/// Move each centroid to the mean of its cluster. Every cluster must be non-empty.
fn update_centroids<const N: usize>(samples: &[[u8; N]], clusters: &Partition, centroids: &mut [[f64; N]]) {
	for (centroid, members) in centroids.iter_mut().zip(clusters) {
		debug_assert!(!members.is_empty());
		*centroid = mean(samples, members);
	}
}

/// Round a centroid to the nearest integer in each channel
// Means of u8 values already lie in 0..=255, the clamp only guards the cast
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round<const N: usize>(centroid: [f64; N]) -> [u8; N] {
	centroid.map(|c| c.round().clamp(0.0, f64::from(u8::MAX)) as u8)
}

/// Run k-means until the partition repeats or the iteration cap is hit
fn kmeans<const N: usize>(
	samples: &[[u8; N]],
	KmeansState { centroids, clusters, previous }: &mut KmeansState<N>,
	k: usize,
	rng: &mut impl Rng,
) -> KmeansResult<N> {
	initial_centroids(k, rng, samples, centroids);

	let mut iterations = 0;
	let converged = loop {
		iterations += 1;
		update_assignments(samples, centroids, clusters);

		// Vec equality compares the nested index lists by value and in order.
		// The previous partition includes any repaired samples, so a degenerate pass never counts as converged.
		if clusters == previous {
			break true;
		}
		if iterations >= MAX_ITERATIONS {
			break false;
		}

		let repaired = repair_empty_clusters(rng, samples.len(), clusters);
		if repaired > 0 {
			trace!("iteration {iterations}: repaired {repaired} empty clusters");
		}

		update_centroids(samples, clusters, centroids);

		std::mem::swap(clusters, previous);
	};

	debug!("k-means with k = {k} finished after {iterations} iterations (converged: {converged})");

	KmeansResult {
		palette: centroids.iter().copied().map(round).collect(),
		counts: clusters.iter().map(Vec::len).collect(),
		iterations,
		converged,
	}
}

/// Cluster `samples` into a palette of exactly `k` colors.
///
/// The random source is used to pick the starting centroids and to repair empty clusters.
///
/// # Errors
/// Returns [`Error::InvalidK`] if `k` is `0` or greater than the number of samples.
pub fn run<const N: usize>(samples: &[[u8; N]], k: usize, rng: &mut impl Rng) -> Result<KmeansResult<N>, Error> {
	if k == 0 || k > samples.len() {
		Err(Error::InvalidK { k, samples: samples.len() })
	} else {
		let mut state = KmeansState::new(k);
		Ok(kmeans(samples, &mut state, k, rng))
	}
}
