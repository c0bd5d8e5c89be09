pub mod digest;
pub mod ids;
pub mod model;
pub mod time;

pub use digest::*;
pub use ids::*;
pub use model::*;
pub use time::{now, Timestamp};
