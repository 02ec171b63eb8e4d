pub mod delimited;

pub use delimited::{read_delimited, read_delimited_str, read_delimited_with_config, LoaderConfig};
