pub mod error;
pub mod progress;
pub mod store;

pub use error::*;
pub use progress::*;
pub use store::*;
