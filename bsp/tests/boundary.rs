use bsp::{LayerSpec, TrainErr, TrainingConfig, train_local};
use math::Vector;
use model::ModelErr;

fn base_config() -> TrainingConfig {
    TrainingConfig {
        learning_rate: 0.5,
        momentum_weight: 0.1,
        regularization_weight: 0.01,
        batch_size: 2,
        max_iterations: 100,
        convergence_check_interval: 10,
        layers: vec![
            LayerSpec {
                size: 2,
                activation: "sigmoid".into(),
            },
            LayerSpec {
                size: 1,
                activation: "sigmoid".into(),
            },
        ],
        cost: "cross_entropy".into(),
        model_path: "unused".into(),
        workers: 2,
    }
}

#[test]
fn a_config_parsed_from_json_builds_a_model() {
    let json = r#"{
        "learning_rate": 0.5,
        "batch_size": 4,
        "max_iterations": 1000,
        "convergence_check_interval": 100,
        "layers": [
            {"size": 2, "activation": "sigmoid"},
            {"size": 3, "activation": "sigmoid"},
            {"size": 1, "activation": "sigmoid"}
        ],
        "cost": "squared_error",
        "model_path": "/tmp/model.bin"
    }"#;
    let config: TrainingConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.momentum_weight, 0.0);
    assert_eq!(config.workers, 2);
    let model = config.build_model().unwrap();
    assert_eq!(model.layer_sizes(), &[3, 4, 1]);
    assert_eq!(model.input_dimension(), 2);
}

#[test]
fn unknown_function_names_fail_at_validation_time() {
    let mut config = base_config();
    config.layers[1].activation = "relu".into();
    match config.validate() {
        Err(TrainErr::Model(ModelErr::UnknownFunction { name })) => assert_eq!(name, "relu"),
        other => panic!("expected UnknownFunction, got {other:?}"),
    }

    let mut config = base_config();
    config.cost = "hinge".into();
    assert!(config.validate().is_err());
}

#[test]
fn scalar_bounds_fail_at_validation_time() {
    let mut config = base_config();
    config.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = base_config();
    config.learning_rate = 0.0;
    assert!(config.validate().is_err());

    let mut config = base_config();
    config.momentum_weight = 1.0;
    assert!(config.validate().is_err());

    let mut config = base_config();
    config.layers.truncate(1);
    assert!(config.validate().is_err());
}

#[test]
fn an_unsupported_pairing_fails_at_validation_time() {
    let mut config = base_config();
    config.layers[1].activation = "identity".into();
    match config.validate() {
        Err(TrainErr::Model(ModelErr::InvalidConfiguration { .. })) => {}
        other => panic!("expected InvalidConfiguration, got {other:?}"),
    }
}

#[test]
fn training_needs_at_least_one_instance_per_worker() {
    let config = base_config();
    let instances = vec![Vector::from(vec![0.0, 1.0, 1.0])];
    match train_local(&config, &instances) {
        Err(TrainErr::Model(ModelErr::InvalidConfiguration { .. })) => {}
        other => panic!("expected InvalidConfiguration, got {other:?}"),
    }
}
