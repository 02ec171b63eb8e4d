pub mod curve;
pub mod describe;
pub mod sections;
pub mod train;

pub use curve::{parse_param_values, run_curve, write_curve_report};
pub use describe::{describe_data, write_describe_report};
pub use train::{run_search, run_train, write_run_report};
