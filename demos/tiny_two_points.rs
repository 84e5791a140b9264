//! Memorize two examples with a 4-3-2-2 network and watch the loss fall.

use fcnn::{Activation, Dataset, Layer, Network, Shuffle, TrainConfig, Trainer};

fn main() -> fcnn::Result<()> {
    let train = Dataset::from_flat(
        vec![-0.3, 1.0, 0.4, -0.8, 1.0, 0.5, -0.5, 0.2],
        vec![0, 1],
        4,
        2,
    )?;

    let network = Network::from_layers(vec![
        Layer::from_parts(
            4,
            3,
            Activation::ReLU,
            vec![0.5, -0.3, 0.2, 0.1, 0.4, -0.2, -0.2, 0.3, 0.5, 0.3, -0.1, 0.4],
            vec![0.0; 3],
        )?,
        Layer::from_parts(
            3,
            2,
            Activation::ReLU,
            vec![0.4, -0.3, 0.2, 0.5, -0.3, 0.4],
            vec![0.0; 2],
        )?,
        Layer::from_parts(2, 2, Activation::Identity, vec![0.3, -0.2, -0.1, 0.4], vec![0.0; 2])?,
    ])?;

    let mut config = TrainConfig {
        batch_size: 2,
        learning_rate: 0.1,
        reg: 0.0,
        epochs: 100,
        log_every: 1,
        shuffle: Shuffle::None,
        ..TrainConfig::default()
    };
    config.network.input_dim = 4;
    config.network.hidden1 = 3;
    config.network.hidden2 = 2;
    config.network.num_classes = 2;

    let mut trainer = Trainer::with_network(network, config)?;
    let report = trainer.fit_with_callback(&train, None, |r| {
        if r.epoch % 10 == 0 {
            println!(
                "epoch={} loss={:.6} acc={}",
                r.epoch, r.loss, r.train_accuracy
            );
        }
    })?;

    println!(
        "steps={} final_loss={:.6} predictions={:?}",
        report.steps,
        report.final_loss,
        trainer.predict(train.images())?
    );
    Ok(())
}
