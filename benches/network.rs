use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fcnn::{Network, NetworkConfig};

const BATCH: usize = 64;

fn inputs(config: &NetworkConfig) -> (Vec<f64>, Vec<usize>) {
    let images = (0..BATCH * config.input_dim)
        .map(|i| ((i % 251) as f64) / 255.0)
        .collect();
    let labels = (0..BATCH).map(|i| i % config.num_classes).collect();
    (images, labels)
}

fn forward_bench(c: &mut Criterion) {
    let config = NetworkConfig::default();
    let net = Network::new_with_seed(&config, 0).unwrap();
    let (images, _) = inputs(&config);

    c.bench_function("forward_64x784_500_200_10", |b| {
        b.iter(|| {
            let scores = net.forward(black_box(&images)).unwrap();
            black_box(scores);
        })
    });
}

fn loss_and_gradients_bench(c: &mut Criterion) {
    let config = NetworkConfig::default();
    let net = Network::new_with_seed(&config, 0).unwrap();
    let mut grads = net.gradients();
    let (images, labels) = inputs(&config);

    c.bench_function("loss_and_gradients_64x784_500_200_10", |b| {
        b.iter(|| {
            let loss = net
                .loss_and_gradients_into(black_box(&images), &labels, 0.1, &mut grads)
                .unwrap();
            black_box(loss);
        })
    });
}

criterion_group!(benches, forward_bench, loss_and_gradients_bench);
criterion_main!(benches);
