use crate::config::ModelType;
use crate::error::Result;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::knn::KnnClassifier;
use crate::models::logistic::LogisticClassifier;
use crate::models::mlp::MlpClassifier;
use crate::models::svm::SvmClassifier;

/// Build a boxed classifier from a `ModelType`, after checking its
/// hyperparameter ranges.
pub fn build_model(model_type: &ModelType) -> Result<Box<dyn ClassifierModel>> {
    model_type.validate()?;
    let model: Box<dyn ClassifierModel> = match model_type {
        ModelType::Knn(cfg) => Box::new(KnnClassifier::new(cfg.clone())),
        ModelType::Svm(cfg) => Box::new(SvmClassifier::new(cfg.clone())),
        ModelType::LogisticRegression(cfg) => Box::new(LogisticClassifier::new(cfg.clone())),
        ModelType::Mlp(cfg) => Box::new(MlpClassifier::new(cfg.clone())),
    };
    Ok(model)
}
