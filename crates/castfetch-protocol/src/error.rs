use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("BPSV document is empty")]
    EmptyDocument,

    #[error("BPSV header is invalid: {0}")]
    BpsvSyntax(String),

    #[error("config line is not of the form `key = value`: {0:?}")]
    ConfigSyntax(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
