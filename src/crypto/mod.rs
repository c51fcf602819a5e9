pub mod password;
pub mod token;

pub use password::*;
pub use token::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Malformed password hash")]
    MalformedHash,

    #[error("Unsupported password hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Iteration count must be positive")]
    InvalidIterations,
}
