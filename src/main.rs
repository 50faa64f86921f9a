use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use digit_rank::{knn::KNearest, mnist, ranking};

/// Train a nearest-neighbour digit classifier on MNIST and rank its votes.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding the four MNIST files.
    #[arg(long, default_value = "data/")]
    data_dir: PathBuf,

    /// Neighbours consulted per prediction.
    #[arg(long, default_value_t = 3)]
    neighbors: usize,

    /// Use only the first N training images.
    #[arg(long)]
    train_limit: Option<usize>,

    /// Use only the first N test images.
    #[arg(long)]
    test_limit: Option<usize>,

    /// Classes to report per ranked digit.
    #[arg(long, default_value_t = 3)]
    top: usize,

    /// Number of test digits to draw and rank.
    #[arg(long, default_value_t = 0)]
    preview: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data = mnist::read(&args.data_dir)
        .with_context(|| format!("reading MNIST from {}", args.data_dir.display()))?;

    let train_len = args
        .train_limit
        .map_or(data.training_images.len(), |n| n.min(data.training_images.len()));
    let test_len = args
        .test_limit
        .map_or(data.test_images.len(), |n| n.min(data.test_images.len()));

    let model = KNearest::train(
        &data.training_images[..train_len],
        &data.training_labels[..train_len],
        args.neighbors,
    )
    .context("training")?;
    info!(
        "model holds {} samples, consulting {} neighbours",
        model.len(),
        model.k()
    );

    let accuracy = model
        .validate(&data.test_images[..test_len], &data.test_labels[..test_len])
        .context("validating")?;
    println!(
        "accuracy: {:#.3}% over {} test digits",
        accuracy * 100.0,
        test_len
    );

    for (i, (image, label)) in data.test_data().take(args.preview).enumerate() {
        let votes = model.votes(image)?;
        let predictions = ranking::classify(&votes, args.top.min(votes.len()))?;
        info!("digit {i}: votes {votes:?}");

        print!("[{i}] label {label}:\n{}", mnist::render(image, 128));
        for prediction in predictions {
            println!("  {}: {:.3}", prediction.index, prediction.probability);
        }
    }

    Ok(())
}
