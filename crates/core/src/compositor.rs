//! Turning provider outputs into the final artifact.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("Nothing to compose")]
    NoInputs,

    #[error("Compositing failed: {0}")]
    Failed(String),
}

/// A composed artifact and its preview.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedArtifact {
    pub url: String,
    pub thumbnail_url: String,
}

/// Combines generated images into one artifact and produces thumbnails.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Compose `image_urls` (in tile order) into one artifact named after `code`.
    async fn compose(
        &self,
        code: &str,
        image_urls: &[String],
    ) -> Result<ComposedArtifact, CompositorError>;

    /// Produce a `width`x`height` preview of the media at `url`.
    async fn thumbnail(&self, url: &str, width: u32, height: u32)
        -> Result<String, CompositorError>;
}

/// Compositor that does no image processing: the first tile is used as the
/// artifact and media serve as their own thumbnails.
///
/// Suitable when the display clients lay the tiles out themselves.
#[derive(Debug, Default)]
pub struct PassthroughCompositor;

impl PassthroughCompositor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Compositor for PassthroughCompositor {
    async fn compose(
        &self,
        _code: &str,
        image_urls: &[String],
    ) -> Result<ComposedArtifact, CompositorError> {
        let first = image_urls.first().ok_or(CompositorError::NoInputs)?;
        Ok(ComposedArtifact {
            url: first.clone(),
            thumbnail_url: first.clone(),
        })
    }

    async fn thumbnail(
        &self,
        url: &str,
        _width: u32,
        _height: u32,
    ) -> Result<String, CompositorError> {
        Ok(url.to_string())
    }
}
