pub mod core;

pub use self::core::{BoxError, CoreError, CoreResult};
