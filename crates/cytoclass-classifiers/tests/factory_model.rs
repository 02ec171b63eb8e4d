use cytoclass_classifiers::config::{KnnConfig, LogisticConfig, MlpConfig, ModelType, SvmConfig, SvmKernel};
use cytoclass_classifiers::models::{build_model, ClassifierModel, ScaledClassifier};
use cytoclass_classifiers::preprocessing::DegeneratePolicy;
use ndarray::{array, Array1, Array2};

fn tiny() -> (Array2<f64>, Array1<usize>) {
    let x = Array2::from_shape_vec(
        (6, 2),
        vec![
            1.0, 0.0, // class 1
            0.0, 1.0, // class 0
            1.0, 0.1, // class 1
            0.0, 0.9, // class 0
            1.1, 0.0, // class 1
            0.0, 1.2, // class 0
        ],
    )
    .expect("failed to create feature matrix");
    let y = array![1usize, 0, 1, 0, 1, 0];
    (x, y)
}

#[test]
fn test_factory_builds_and_predicts() {
    let (x, y) = tiny();
    let model_types = vec![
        ModelType::Knn(KnnConfig { n_neighbors: 1, ..KnnConfig::default() }),
        ModelType::Svm(SvmConfig { kernel: SvmKernel::Linear, ..SvmConfig::default() }),
        ModelType::LogisticRegression(LogisticConfig::default()),
    ];
    for model_type in model_types {
        let mut model = build_model(&model_type).unwrap();
        model.fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions, y, "{} misclassified its training data", model.name());
    }
}

#[test]
fn test_mlp_predicts_known_codes() {
    let (x, y) = tiny();
    let mut model = build_model(&ModelType::Mlp(MlpConfig {
        hidden_layer_sizes: vec![8],
        max_epochs: 50,
        ..MlpConfig::default()
    }))
    .unwrap();
    model.fit(&x, &y).unwrap();
    let predictions = model.predict(&x).unwrap();
    assert_eq!(predictions.len(), x.nrows());
    assert!(predictions.iter().all(|&c| c < 2));
}

#[test]
fn test_one_nearest_neighbour_example() {
    let x = array![[0.0, 0.0], [0.0, 1.0], [10.0, 10.0]];
    let y = array![0usize, 0, 1];
    let mut model = build_model(&ModelType::Knn(KnnConfig { n_neighbors: 1, ..KnnConfig::default() })).unwrap();
    model.fit(&x, &y).unwrap();
    assert_eq!(model.predict(&array![[10.0, 11.0]]).unwrap(), array![1usize]);
}

#[test]
fn test_scaled_classifier_rejects_constant_feature() {
    let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
    let y = array![0usize, 0, 1, 1];
    let mut strict = ScaledClassifier::from_model_type(&ModelType::default(), DegeneratePolicy::Error).unwrap();
    assert!(strict.fit(&x, &y).is_err());

    let mut lenient = ScaledClassifier::from_model_type(
        &ModelType::Knn(KnnConfig { n_neighbors: 1, ..KnnConfig::default() }),
        DegeneratePolicy::Zero,
    )
    .unwrap();
    lenient.fit(&x, &y).unwrap();
    assert_eq!(lenient.predict(&x).unwrap(), y);
}

#[test]
fn test_factory_rejects_invalid_hyperparameters() {
    assert!(build_model(&ModelType::Knn(KnnConfig { n_neighbors: 0, ..KnnConfig::default() })).is_err());
    assert!(build_model(&ModelType::Svm(SvmConfig { c: -1.0, ..SvmConfig::default() })).is_err());
}
