#![allow(clippy::cast_precision_loss)]

use core::sync::atomic::{AtomicU64, Ordering};
use std::fmt::Write as _;
use std::path::PathBuf;

use smbo::metrics;
use smbo::prelude::*;

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_file(stem: &str, ext: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("smbo_{stem}_{}_{n}.{ext}", std::process::id()))
}

fn space() -> ConfigurationSpace {
    ConfigurationSpace::uniform(2, 0.01, 1.0).unwrap()
}

/// Rows `(x0, x1) -> (x0, x1)` on a regular grid inside the space.
fn grid() -> Vec<Vec<f64>> {
    let mut rows = Vec::new();
    for i in 0..6 {
        for j in 0..6 {
            rows.push(vec![0.01 + 0.99 * f64::from(i) / 5.0, 0.01 + 0.99 * f64::from(j) / 5.0]);
        }
    }
    rows
}

fn model() -> DenseModel {
    DenseModel::builder()
        .hidden(16)
        .epochs(400)
        .learning_rate(0.02)
        .seed(3)
        .build()
}

fn history_from(points: &[Vec<f64>]) -> RunHistory {
    let space = space();
    let mut history = RunHistory::new();
    for p in points {
        let config = space.configuration_from(p.clone()).unwrap();
        let field = Field::from_row_slice(1, 2, p);
        history.push(
            config,
            0,
            p.iter().sum(),
            ConfigOrigin::InitialDesign,
            Some(std::sync::Arc::new(field)),
        );
    }
    history
}

#[test]
fn warm_start_from_csv() {
    let path = temp_file("offline", "csv");
    let mut csv = String::from("x0,x1,y0,y1\n");
    for row in grid() {
        writeln!(csv, "{},{},{},{}", row[0], row[1], row[0], row[1]).unwrap();
    }
    std::fs::write(&path, csv).unwrap();

    let mut surrogate = NetworkSurrogate::builder(space(), model())
        .reduction(PNorm::new(1.0))
        .data_loader(CsvDataLoader::new(&path, 2))
        .build();
    let warm = surrogate.warm_start();
    let _ = std::fs::remove_file(&path);
    warm.unwrap();

    assert!(surrogate.is_fitted());
    assert_eq!(surrogate.fit_version(), 0);
    let (mean, var) = surrogate
        .predict_marginalized(&[vec![0.0, 0.0], vec![1.0, 1.0]])
        .unwrap();
    assert!(mean[0] < mean[1]);
    assert!(var.iter().all(|&v| v == 0.0));
}

#[test]
fn refit_includes_offline_rows() {
    let offline = Dataset::new(grid(), grid()).unwrap();
    let mut surrogate = NetworkSurrogate::builder(space(), model())
        .reduction(PNorm::new(1.0))
        .data_loader(InMemoryDataLoader::new(offline))
        .build();
    surrogate.train(&history_from(&[vec![0.2, 0.3], vec![0.9, 0.1]])).unwrap();
    assert_eq!(surrogate.fit_version(), 1);

    // Two online rows alone could not order the corners; the grid does.
    let (mean, _) = surrogate
        .predict_marginalized(&[vec![0.05, 0.05], vec![0.95, 0.95]])
        .unwrap();
    assert!(mean[0] < mean[1]);
}

#[test]
fn weights_round_trip_through_a_file() {
    let mut trained = NetworkSurrogate::builder(space(), model())
        .reduction(PNorm::new(1.0))
        .build();
    trained.train(&history_from(&grid())).unwrap();

    let path = temp_file("weights", "json");
    trained.save(&path).unwrap();
    let mut restored = NetworkSurrogate::builder(space(), DenseModel::default())
        .reduction(PNorm::new(1.0))
        .build();
    let loaded = restored.load(&path);
    let _ = std::fs::remove_file(&path);
    loaded.unwrap();

    let queries = [vec![0.1, 0.7], vec![0.5, 0.5]];
    let (a, _) = trained.predict_marginalized(&queries).unwrap();
    let (b, _) = restored.predict_marginalized(&queries).unwrap();
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-12);
    }
}

#[test]
fn gaussian_process_interpolates_its_data() {
    let points = grid();
    let mut gp = GaussianProcessSurrogate::new(space());
    gp.train(&history_from(&points)).unwrap();
    let encoded: Vec<Vec<f64>> = points
        .iter()
        .map(|p| space().to_unit(&space().configuration_from(p.clone()).unwrap()))
        .collect();
    let (mean, var) = gp.predict_marginalized(&encoded).unwrap();
    for (p, (m, v)) in points.iter().zip(mean.iter().zip(&var)) {
        let truth: f64 = p.iter().sum();
        assert!((m - truth).abs() < 1e-2, "mean {m} vs {truth}");
        assert!(*v < 1e-3);
    }
}

#[test]
fn network_beats_constant_baseline() {
    let points = grid();
    let mut model = model();
    let features: Vec<Vec<f64>> = points
        .iter()
        .map(|p| space().to_unit(&space().configuration_from(p.clone()).unwrap()))
        .collect();
    model.fit(&features, &points).unwrap();

    let predictions: Vec<Vec<f64>> = features
        .iter()
        .map(|x| model.predict(x, None).unwrap())
        .collect();
    let n = points.len() as f64;
    let mean = [
        points.iter().map(|p| p[0]).sum::<f64>() / n,
        points.iter().map(|p| p[1]).sum::<f64>() / n,
    ];
    let constant = vec![mean.to_vec(); points.len()];

    let reduction = PNorm::new(1.0);
    assert!(metrics::rmse(&points, &predictions) < metrics::rmse(&points, &constant));
    assert!(
        metrics::rmse_objective(&points, &predictions, &reduction)
            < metrics::rmse_objective(&points, &constant, &reduction)
    );
}
