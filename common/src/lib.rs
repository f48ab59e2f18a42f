pub mod err;
pub mod log;

pub use err::{CResult, CacheError};
