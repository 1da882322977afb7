pub mod engine;
pub mod iterators;
pub mod params;
pub mod registry;
pub mod tasks;
pub mod validator;

pub use engine::*;
pub use iterators::*;
pub use params::*;
pub use registry::*;
pub use tasks::*;
pub use validator::*;
