use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkywatchError {
    #[error("State error: {0}")]
    State(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<std::io::Error> for SkywatchError {
    fn from(err: std::io::Error) -> Self {
        SkywatchError::State(err.to_string())
    }
}

impl From<serde_json::Error> for SkywatchError {
    fn from(err: serde_json::Error) -> Self {
        SkywatchError::State(err.to_string())
    }
}
