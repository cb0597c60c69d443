// Error types module

/// Request-level errors surfaced to the caller.
///
/// Any of these aborts the whole request: no partial output is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    /// The file extension is not handled by any renderer.
    #[error("File type not supported: {file_name}")]
    UnsupportedFormat { file_name: String },

    /// The input bytes are not valid for the claimed format.
    #[error("Failed to decode {format} input: {message}")]
    Decode {
        format: &'static str,
        message: String,
    },

    /// Re-serializing the watermarked document failed.
    #[error("Failed to encode {format} output: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },

    /// Invalid watermark or application configuration.
    #[error("Watermark configuration error: {0}")]
    Config(String),
}

impl WatermarkError {
    pub fn decode(format: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            format,
            message: message.into(),
        }
    }

    pub fn encode(format: &'static str, message: impl Into<String>) -> Self {
        Self::Encode {
            format,
            message: message.into(),
        }
    }
}

/// Failure to watermark a single page, sheet or header.
///
/// Renderers log these and continue with the next unit; they never escape
/// to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Unit {index} does not exist")]
    NoSuchUnit { index: usize },

    #[error("PDF object error: {0}")]
    Pdf(String),

    #[error("Package error: {0}")]
    Package(String),

    #[error("Image error: {0}")]
    Image(String),
}
