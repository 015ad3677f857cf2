use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
