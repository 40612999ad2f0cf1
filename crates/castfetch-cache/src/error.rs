use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid cache key: {0}")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;
