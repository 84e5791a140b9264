use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use fcnn::{mnist, NetworkConfig, Shuffle, TrainConfig, Trainer};

/// Train a 784-H1-H2-10 ReLU network on MNIST with plain minibatch SGD.
#[derive(Parser, Debug, Clone)]
#[command(name = "fcnn", version, about)]
struct Args {
    /// Directory holding the four MNIST IDX files (optionally `.gz`).
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, default_value_t = 10)]
    epochs: usize,

    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    #[arg(long, default_value_t = 500)]
    hidden1: usize,

    #[arg(long, default_value_t = 200)]
    hidden2: usize,

    #[arg(long, default_value_t = 1e-3)]
    learning_rate: f64,

    /// L2 regularization strength.
    #[arg(long, default_value_t = 1e-1)]
    reg: f64,

    /// Standard deviation of the initial weights.
    #[arg(long, default_value_t = 0.005)]
    weight_scale: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Report progress every N iterations (0 disables).
    #[arg(long, default_value_t = 100)]
    log_every: usize,

    /// Reshuffle the training set every epoch with this seed.
    #[arg(long)]
    shuffle: Option<u64>,

    /// Measure progress on only the first N validation images.
    #[arg(long)]
    validation_sample: Option<usize>,

    /// Write the trained parameters to this JSON file (needs the `serde` feature).
    #[arg(long)]
    save: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn train_config(&self) -> TrainConfig {
        TrainConfig {
            network: NetworkConfig {
                input_dim: 28 * 28,
                hidden1: self.hidden1,
                hidden2: self.hidden2,
                num_classes: mnist::NUM_CLASSES,
                weight_scale: self.weight_scale,
            },
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            reg: self.reg,
            epochs: self.epochs,
            seed: self.seed,
            log_every: self.log_every,
            shuffle: self.shuffle.map_or(Shuffle::None, Shuffle::Seeded),
            validation_sample: self.validation_sample,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = args.train_config();
    config.validate().context("invalid training configuration")?;
    let partitions = mnist::load_partitions(&args.data_dir)
        .with_context(|| format!("loading MNIST from {}", args.data_dir.display()))?;

    let start = Instant::now();
    let mut trainer = Trainer::new(config).context("building network")?;
    trainer
        .fit(&partitions.train, Some(&partitions.validation))
        .context("training failed")?;

    let val_acc = trainer.accuracy(&partitions.validation)?;
    let train_acc = trainer.accuracy(&partitions.train)?;
    log::info!("validation accuracy: {val_acc:.4}");
    log::info!("train accuracy: {train_acc:.4}");
    log::info!("execution time: {:.2} seconds", start.elapsed().as_secs_f64());

    let test = trainer.evaluate(&partitions.test)?;
    log::info!("test accuracy: {:.4} (loss {:.4})", test.accuracy, test.loss);

    if let Some(path) = &args.save {
        save(&trainer, path)?;
    }

    Ok(())
}

#[cfg(feature = "serde")]
fn save(trainer: &Trainer, path: &std::path::Path) -> anyhow::Result<()> {
    trainer
        .network()
        .save_json(path)
        .with_context(|| format!("saving parameters to {}", path.display()))?;
    log::info!("saved parameters to {}", path.display());
    Ok(())
}

#[cfg(not(feature = "serde"))]
fn save(_trainer: &Trainer, path: &std::path::Path) -> anyhow::Result<()> {
    anyhow::bail!(
        "cannot save to {}: rebuild with `--features serde`",
        path.display()
    )
}
