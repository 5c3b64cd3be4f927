use bsp::{FsStore, LayerSpec, ModelStore, TrainingConfig, train_local};
use math::Vector;
use model::codec;

fn xor_instances() -> Vec<Vector> {
    [
        [0.0, 1.0, 1.0],
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 0.0],
    ]
    .into_iter()
    .map(|row| Vector::from(row.to_vec()))
    .collect()
}

fn temp_model_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("bsp-{name}-{}.model", std::process::id()))
        .to_string_lossy()
        .into_owned()
}

fn xor_config(model_path: String) -> TrainingConfig {
    TrainingConfig {
        learning_rate: 0.7,
        momentum_weight: 0.5,
        regularization_weight: 0.0,
        batch_size: 4,
        max_iterations: 20_000,
        // far beyond the budget, so the run never stops on the window check
        convergence_check_interval: 1_000_000_000,
        layers: vec![
            LayerSpec {
                size: 2,
                activation: "sigmoid".into(),
            },
            LayerSpec {
                size: 3,
                activation: "sigmoid".into(),
            },
            LayerSpec {
                size: 1,
                activation: "sigmoid".into(),
            },
        ],
        cost: "squared_error".into(),
        model_path,
        workers: 2,
    }
}

/// Contradictory targets for the same input drive the model to a fixed
/// point, after which the error windows stop improving.
fn plateau_config(model_path: String) -> TrainingConfig {
    TrainingConfig {
        learning_rate: 0.3,
        momentum_weight: 0.0,
        regularization_weight: 0.0,
        batch_size: 2,
        max_iterations: 10_000,
        convergence_check_interval: 10,
        layers: vec![
            LayerSpec {
                size: 1,
                activation: "identity".into(),
            },
            LayerSpec {
                size: 1,
                activation: "identity".into(),
            },
        ],
        cost: "squared_error".into(),
        model_path,
        workers: 2,
    }
}

fn contradictory_instances() -> Vec<Vector> {
    vec![
        Vector::from(vec![0.0, 0.0]),
        Vector::from(vec![0.0, 1.0]),
    ]
}

#[test]
fn two_workers_learn_xor_and_persist_the_model() {
    let path = temp_model_path("xor");
    let config = xor_config(path.clone());
    let report = train_local(&config, &xor_instances()).unwrap();

    for instance in &xor_instances() {
        let features = instance.slice_to(2);
        let expected = instance.get(2);
        let actual = report.model.output(&features).unwrap().get(0);
        assert!(
            (actual - expected).abs() < 0.1,
            "prediction {actual} too far from {expected}"
        );
    }

    // the persisted model is the canonical one
    let mut stored = FsStore.open(&path).unwrap();
    let copy = codec::read_model(&mut stored).unwrap();
    for (expected, actual) in report.model.weights().iter().zip(copy.weights()) {
        assert_eq!(expected, actual);
    }
    std::fs::remove_file(&path).ok();
}

#[test]
fn a_stalled_error_window_stops_the_run_early() {
    let path = temp_model_path("plateau");
    let config = plateau_config(path.clone());
    let report = train_local(&config, &contradictory_instances()).unwrap();

    assert!(report.converged);
    assert!(
        report.supersteps < 1_000,
        "expected an early stop, ran {} supersteps",
        report.supersteps
    );
    std::fs::remove_file(&path).ok();
}

#[test]
fn a_stored_model_is_resumed_and_a_zero_gradient_leaves_it_alone() {
    use model::{Activation, Cost, LayeredModel};

    let path = temp_model_path("resume");
    let config = plateau_config(path.clone());

    // seed the store with the fixed point of the contradictory dataset:
    // bias weight 0.5, feature weight 0
    let mut seed = LayeredModel::new(Cost::SquaredError);
    seed.add_layer(1, Activation::Identity, false).unwrap();
    seed.add_layer(1, Activation::Identity, true).unwrap();
    seed.set_learning_rate(0.3).unwrap();
    let mut weights = math::Matrix::zeros(1, 2);
    weights.set(0, 0, 0.5);
    seed.set_weights(vec![weights.clone()]).unwrap();
    let mut out = FsStore.create(&path).unwrap();
    codec::write_model(&seed, &mut out).unwrap();
    drop(out);

    let report = train_local(&config, &contradictory_instances()).unwrap();

    // the mean gradient is exactly zero at the fixed point
    assert_eq!(&report.model.weights()[0], &weights);
    assert!(report.converged);
    std::fs::remove_file(&path).ok();
}

#[test]
fn the_iteration_budget_is_a_hard_stop() {
    let path = temp_model_path("budget");
    let mut config = plateau_config(path.clone());
    config.max_iterations = 25;
    // an interval the run never reaches
    config.convergence_check_interval = 1_000_000;
    let report = train_local(&config, &contradictory_instances()).unwrap();

    assert_eq!(report.supersteps, 25);
    assert!(!report.converged);
    std::fs::remove_file(&path).ok();
}
