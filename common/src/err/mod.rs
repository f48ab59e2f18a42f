pub mod error;

pub use error::CacheError;

pub type CResult<T> = Result<T, CacheError>;
