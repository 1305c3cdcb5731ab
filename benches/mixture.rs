//! Benchmarks for the gradient-trained Gaussian mixture.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mixgrad::prelude::*;

fn observations(n: usize, d: usize) -> Matrix<f32> {
    let data: Vec<f32> = (0..n * d)
        .map(|i| ((i * 37 % 101) as f32 / 101.0 - 0.5) * 8.0)
        .collect();
    Matrix::from_vec(n, d, data).expect("valid matrix")
}

fn bench_forward_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixture_forward_backward");

    for size in [100, 500, 1000, 5000].iter() {
        let x = observations(*size, 4);
        let model = MixtureModel::from_config(&MixtureConfig::new(3, 4).with_seed(42))
            .expect("valid shape");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                clear_graph();
                let loss = model.forward(black_box(&x)).expect("finite input");
                loss.backward();
            });
        });
    }

    group.finish();
    clear_graph();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixture_predict");

    for dim in [1, 4, 16].iter() {
        let x = observations(1000, *dim);
        let model = MixtureModel::from_config(&MixtureConfig::new(4, *dim).with_seed(42))
            .expect("valid shape");

        group.bench_with_input(BenchmarkId::from_parameter(dim), dim, |b, _| {
            b.iter(|| model.predict(black_box(&x)).expect("finite input"));
        });
    }

    group.finish();
}

fn bench_fit(c: &mut Criterion) {
    let x = observations(500, 2);

    c.bench_function("mixture_fit_100_steps", |b| {
        b.iter(|| {
            let mut model = MixtureModel::from_config(&MixtureConfig::new(2, 2).with_seed(7))
                .expect("valid shape");
            let mut adam = Adam::new(0.05).expect("valid learning rate");
            Trainer::new()
                .with_max_iter(100)
                .with_tol(0.0)
                .fit(&mut model, black_box(&x), &mut adam)
                .expect("finite training run")
        });
    });
}

criterion_group!(benches, bench_forward_backward, bench_predict, bench_fit);
criterion_main!(benches);
