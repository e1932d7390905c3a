use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request Error: {0}")]
    Transport(String),

    #[error("TLS Error: {0}")]
    Tls(String),

    #[error("DNS Error: {0}")]
    Dns(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable identifier used in log fields.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidUrl(_) => "INVALID_URL",
            AppError::Transport(_) => "REQUEST_FAILED",
            AppError::Tls(_) => "TLS_ERROR",
            AppError::Dns(_) => "DNS_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
