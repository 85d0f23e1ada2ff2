use thiserror::Error;

/// Errors that can occur when working with the hash map
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Constructor arguments the table cannot operate with
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Key not found in the map
    #[error("key not found")]
    KeyNotFound,
}

pub type Result<T> = std::result::Result<T, MapError>;
