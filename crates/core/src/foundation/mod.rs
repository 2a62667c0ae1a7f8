pub mod lifecycle;
pub mod traits;

pub use lifecycle::{InstanceState, StateCell};
pub use traits::{AsAny, Bean, Instance};
