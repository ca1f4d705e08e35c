//! Incremental centroid maintenance for topic clusters.

/// Fold `sample` into a centroid that currently averages `count` vectors.
///
/// With no prior centroid (or `count == 0`) the sample becomes the
/// centroid. A sample of a different width replaces the centroid, since
/// mixing widths has no meaningful mean.
#[allow(clippy::cast_precision_loss)]
pub fn running_mean(centroid: Option<&[f32]>, count: u32, sample: &[f32]) -> Vec<f32> {
    match centroid {
        Some(c) if count > 0 && c.len() == sample.len() => {
            let n = count as f32;
            c.iter()
                .zip(sample)
                .map(|(m, x)| m + (x - m) / (n + 1.0))
                .collect()
        }
        _ => sample.to_vec(),
    }
}
