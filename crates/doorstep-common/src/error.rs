use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("geolocation error: {0}")]
    Geolocation(String),

    #[error("store unavailable: {0}")]
    Store(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("gateway error: {0}")]
    Gateway(String),
}
