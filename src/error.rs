use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("data service request failed: {0}")]
    Fetch(String),

    #[error("data service returned HTTP {status}: {body}")]
    FetchStatus { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("import failed: {0}")]
    Import(String),

    #[error("export failed: {0}")]
    Export(String),
}

impl From<reqwest::Error> for DashboardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            DashboardError::Decode(e.to_string())
        } else {
            DashboardError::Fetch(e.to_string())
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(e: std::io::Error) -> Self {
        DashboardError::Export(e.to_string())
    }
}

impl From<csv::Error> for DashboardError {
    fn from(e: csv::Error) -> Self {
        DashboardError::Export(e.to_string())
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
