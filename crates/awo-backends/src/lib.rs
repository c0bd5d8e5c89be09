pub mod local;
pub mod registry;
pub mod types;

pub use local::*;
pub use registry::*;
pub use types::*;
