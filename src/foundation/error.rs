/// Convenience result type used across the crate.
pub type ScrawlResult<T> = Result<T, ScrawlError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum ScrawlError {
    /// Invalid user-provided options, canvas dimensions, or image data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors while rasterizing strokes or reading back the surface.
    #[error("render error: {0}")]
    Render(String),

    /// Errors when serializing or deserializing configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrawlError {
    /// Build a [`ScrawlError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ScrawlError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`ScrawlError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category_and_message() {
        let e = ScrawlError::validation("scale_factor must be finite");
        assert_eq!(
            e.to_string(),
            "validation error: scale_factor must be finite"
        );

        let e = ScrawlError::render("surface too large");
        assert_eq!(e.to_string(), "render error: surface too large");
    }

    #[test]
    fn anyhow_errors_pass_through() {
        let inner = anyhow::anyhow!("decode image from memory");
        let e = ScrawlError::from(inner);
        assert_eq!(e.to_string(), "decode image from memory");
    }
}
