pub mod classifier_trait;
pub mod factory;
pub mod knn;
pub mod logistic;
pub mod mlp;
pub mod scaled;
pub mod svm;
pub mod utils;

pub use classifier_trait::ClassifierModel;
pub use factory::build_model;
pub use scaled::ScaledClassifier;
