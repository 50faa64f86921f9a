use indicatif::{ParallelProgressIterator, ProgressStyle};
use log::info;
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::{cmp::Reverse, time::Instant};

use crate::{
    error::{Error, Result},
    mnist::{check_lengths, Image, IMAGE_SIZE},
    ranking::top_k,
};

pub const CLASSES: usize = 10;

/// Stacks the normalised pixels of every image into one row per sample.
pub fn prepare_samples(images: &[Image]) -> DMatrix<f32> {
    DMatrix::from_fn(images.len(), IMAGE_SIZE, |r, c| {
        images[r].pixels()[c] as f32 / 255.
    })
}

/// Nearest-neighbour digit classifier.
#[derive(Debug, Clone)]
pub struct KNearest {
    samples: DMatrix<f32>,
    labels: Vec<u8>,
    k: usize,
}

impl KNearest {
    /// Memorises the training set. `k` is the number of neighbours consulted
    /// per prediction; it is capped at the number of samples.
    pub fn train(images: &[Image], labels: &[u8], k: usize) -> Result<Self> {
        check_lengths(images, labels)?;
        if images.is_empty() {
            return Err(Error::InvalidArgument("no training samples".into()));
        }
        if k == 0 {
            return Err(Error::InvalidArgument("k must be at least 1".into()));
        }
        if let Some(label) = labels.iter().find(|&&l| l as usize >= CLASSES) {
            return Err(Error::InvalidArgument(format!(
                "label {label} is not a digit"
            )));
        }

        let start = Instant::now();
        let samples = prepare_samples(images);
        info!(
            "trained k-NN on {} samples (k = {k}) in {:?}",
            images.len(),
            start.elapsed()
        );

        Ok(Self {
            samples,
            labels: labels.to_vec(),
            k,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Indices of the nearest training samples, closest first.
    fn neighbours(&self, image: &Image) -> Result<Vec<usize>> {
        let query = image.features();

        let closeness: Vec<f32> = self
            .samples
            .row_iter()
            .map(|row| {
                -row.iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
            })
            .collect();

        let (_, nearest) = top_k(&closeness, self.k.min(closeness.len()))?;
        Ok(nearest)
    }

    /// Number of neighbours voting for each digit.
    pub fn votes(&self, image: &Image) -> Result<Vec<f32>> {
        let mut votes = vec![0.; CLASSES];
        for i in self.neighbours(image)? {
            votes[self.labels[i] as usize] += 1.;
        }
        Ok(votes)
    }

    /// The digit most of the neighbours agree on. Drawn votes go to the digit
    /// whose sample was closest.
    pub fn predict(&self, image: &Image) -> Result<u8> {
        let nearest = self.neighbours(image)?;

        let mut counts = [0usize; CLASSES];
        for &i in &nearest {
            counts[self.labels[i] as usize] += 1;
        }

        nearest
            .iter()
            .map(|&i| self.labels[i])
            .min_by_key(|&label| Reverse(counts[label as usize]))
            .ok_or_else(|| Error::InvalidArgument("model has no samples".into()))
    }

    /// Fraction of `images` classified as their label.
    pub fn validate(&self, images: &[Image], labels: &[u8]) -> Result<f32> {
        check_lengths(images, labels)?;
        if images.is_empty() {
            return Err(Error::InvalidArgument("nothing to validate".into()));
        }

        let style = ProgressStyle::with_template(
            "[{elapsed:.green}] [{wide_bar:.cyan/red}] {pos:.red}/{len:.green} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

        let start = Instant::now();
        let hits = images
            .par_iter()
            .zip(labels.par_iter())
            .progress_with_style(style)
            .map(|(image, &label)| self.predict(image).map(|digit| digit == label))
            .collect::<Result<Vec<bool>>>()?;

        let correct = hits.into_iter().filter(|&hit| hit).count();
        let accuracy = correct as f32 / images.len() as f32;

        info!(
            "validated {} / {}: {:#.3}%  time: {:#?}",
            correct,
            images.len(),
            accuracy * 100.0,
            start.elapsed()
        );

        Ok(accuracy)
    }
}
