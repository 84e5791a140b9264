use std::time::Instant;

use clap::Parser;

use fcnn::{Network, NetworkConfig};

/// Time batched forward passes through a freshly initialized network.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: u64,

    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    iters: u64,

    #[arg(long, default_value_t = 20)]
    warmup: usize,

    #[arg(long, default_value_t = 500)]
    hidden1: usize,

    #[arg(long, default_value_t = 200)]
    hidden2: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> fcnn::Result<()> {
    let args = Args::parse();
    let batch_size = args.batch_size as usize;
    let iters = args.iters as usize;
    let warmup = args.warmup;

    let config = NetworkConfig {
        hidden1: args.hidden1,
        hidden2: args.hidden2,
        ..NetworkConfig::default()
    };
    let net = Network::new_with_seed(&config, args.seed)?;

    let backend = if cfg!(feature = "matrixmultiply") {
        "matrixmultiply"
    } else {
        "naive"
    };

    let inputs: Vec<f64> = (0..batch_size * config.input_dim)
        .map(|i| ((i % 256) as f64) / 255.0)
        .collect();

    for _ in 0..warmup {
        let scores = net.forward(std::hint::black_box(&inputs))?;
        std::hint::black_box(scores);
    }

    let start = Instant::now();
    let mut checksum = 0.0_f64;
    for _ in 0..iters {
        let scores = net.forward(std::hint::black_box(&inputs))?;
        checksum += scores.as_slice()[0];
    }
    let elapsed_s = start.elapsed().as_secs_f64();
    std::hint::black_box(checksum);

    let samples_per_s = (iters * batch_size) as f64 / elapsed_s;
    println!(
        "fcnn perf_forward_batch backend={backend} batch_size={batch_size} iters={iters} warmup={warmup} hidden1={} hidden2={} elapsed_s={elapsed_s:.6} samples_per_s={samples_per_s:.2} checksum={checksum}",
        config.hidden1, config.hidden2,
    );

    Ok(())
}
