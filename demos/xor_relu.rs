use fcnn::{Dataset, NetworkConfig, Shuffle, TrainConfig, Trainer};

fn main() -> fcnn::Result<()> {
    // XOR as a two-class problem.
    let xs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let ys = [0, 1, 1, 0];
    let train = Dataset::from_rows(&xs, &ys, 2)?;

    let mut trainer = Trainer::new(TrainConfig {
        network: NetworkConfig {
            input_dim: 2,
            hidden1: 8,
            hidden2: 8,
            num_classes: 2,
            weight_scale: 0.5,
        },
        batch_size: 4,
        learning_rate: 0.1,
        reg: 0.0,
        epochs: 2_000,
        seed: 0,
        log_every: 0,
        shuffle: Shuffle::None,
        validation_sample: None,
    })?;

    let report = trainer.fit(&train, None)?;
    let eval = trainer.evaluate(&train)?;
    println!(
        "final_loss_from_fit={} train_loss={} train_acc={}",
        report.final_loss, eval.loss, eval.accuracy
    );

    let probs = fcnn::loss::softmax(&trainer.forward(train.images())?);
    for (i, x) in xs.iter().enumerate() {
        println!("x={x:?} p={:?}", probs.row(i));
    }

    Ok(())
}
