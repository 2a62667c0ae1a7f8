pub mod container_config;
pub mod sources;
pub mod validation;

pub use container_config::*;
pub use sources::*;
pub use validation::*;
