use crate::fit::FitWarning;
use crate::money::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum InvoiceError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("asset error: {0}")]
    Asset(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("layout error: {0}")]
    Layout(String),
    #[error("table does not fit the page: {0}")]
    DegradedFit(FitWarning),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for InvoiceError {
    fn from(value: lopdf::Error) -> Self {
        InvoiceError::Pdf(value.to_string())
    }
}
