
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use smbo::model::DenseModel;
use smbo::objective::PNorm;
use smbo::space::ConfigurationSpace;
use smbo::surrogate::{GaussianProcessSurrogate, NetworkSurrogate, SurrogateModel};

fn queries(n: usize, d: usize) -> Vec<Vec<f64>> {
    let mut rng = fastrand::Rng::with_seed(7);
    (0..n).map(|_| (0..d).map(|_| rng.f64()).collect()).collect()
}

fn bench_gp_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("gp_train");
    group.sample_size(10);

    for n in [25, 50, 100] {
        let space = ConfigurationSpace::uniform(14, 0.01, 1.0).unwrap();
        let oracle = test_functions::offset_oracle(14);
        let history = test_functions::random_history(&oracle, &PNorm::default(), &space, n, 42);
        group.bench_with_input(BenchmarkId::new("points", n), &history, |b, history| {
            b.iter(|| {
                let mut gp = GaussianProcessSurrogate::new(space.clone());
                gp.train(history).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_gp_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("gp_predict");

    for n in [25, 100] {
        let space = ConfigurationSpace::uniform(14, 0.01, 1.0).unwrap();
        let oracle = test_functions::offset_oracle(14);
        let history = test_functions::random_history(&oracle, &PNorm::default(), &space, n, 42);
        let mut gp = GaussianProcessSurrogate::new(space);
        gp.train(&history).unwrap();
        let x = queries(1000, 14);
        group.bench_with_input(BenchmarkId::new("points", n), &x, |b, x| {
            b.iter(|| gp.predict_marginalized(x).unwrap());
        });
    }
    group.finish();
}

fn bench_network(c: &mut Criterion) {
    let mut group = c.benchmark_group("network");
    group.sample_size(10);

    let space = ConfigurationSpace::uniform(14, 0.01, 1.0).unwrap();
    let oracle = test_functions::mode_oracle(14, 8, 8);
    let history = test_functions::random_history(&oracle, &PNorm::default(), &space, 100, 42);

    group.bench_function("train_100", |b| {
        b.iter(|| {
            let model = DenseModel::builder().hidden(32).epochs(100).build();
            let mut surrogate = NetworkSurrogate::new(space.clone(), model);
            surrogate.train(&history).unwrap();
        });
    });

    let model = DenseModel::builder().hidden(32).epochs(100).build();
    let mut surrogate = NetworkSurrogate::new(space.clone(), model);
    surrogate.train(&history).unwrap();
    let x = queries(1000, 14);
    group.bench_function("predict_1000", |b| {
        b.iter(|| surrogate.predict_marginalized(&x).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_gp_train, bench_gp_predict, bench_network);
criterion_main!(benches);
