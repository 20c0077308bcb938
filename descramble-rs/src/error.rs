use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescrambleError {
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Malformed key array: {0}")]
    MalformedKey(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image encode error: {0}")]
    Encode(String),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl DescrambleError {
    /// Whether the error only affects a single page. Gallery-level errors
    /// (key derivation, access, API) make every page undecryptable.
    pub fn is_page_local(&self) -> bool {
        matches!(
            self,
            DescrambleError::MalformedKey(_)
                | DescrambleError::InvalidDimensions { .. }
                | DescrambleError::Decode(_)
                | DescrambleError::Encode(_)
                | DescrambleError::Fetch(_)
                | DescrambleError::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DescrambleError>;
