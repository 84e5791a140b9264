#[cfg(not(feature = "serde"))]
fn main() {
    println!("enable the `serde` feature: cargo run --example save_load_json --features serde");
}

#[cfg(feature = "serde")]
fn main() -> fcnn::Result<()> {
    use fcnn::{Dataset, Network, NetworkConfig, TrainConfig, Trainer};

    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let train = Dataset::from_rows(&xs, &[0, 1, 1, 0], 2)?;

    let mut trainer = Trainer::new(TrainConfig {
        network: NetworkConfig {
            input_dim: 2,
            hidden1: 8,
            hidden2: 4,
            num_classes: 2,
            weight_scale: 0.5,
        },
        batch_size: 4,
        learning_rate: 0.1,
        reg: 1e-3,
        epochs: 500,
        log_every: 0,
        ..TrainConfig::default()
    })?;
    trainer.fit(&train, None)?;

    let path = "target/tmp_fcnn.json";
    trainer.network().save_json(path)?;

    let loaded = Network::load_json(path)?;
    assert_eq!(&loaded, trainer.network());
    println!(
        "saved and loaded model: {path} predictions={:?}",
        loaded.predict(train.images())?
    );
    Ok(())
}
