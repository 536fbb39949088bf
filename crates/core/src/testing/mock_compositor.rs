//! Mock compositor for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::compositor::{ComposedArtifact, Compositor, CompositorError};

/// A recorded composition for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedComposition {
    pub code: String,
    pub image_urls: Vec<String>,
}

/// Mock implementation of the Compositor trait.
///
/// Composed artifacts are reported at `https://cdn.example/<code>.jpg`;
/// thumbnails append `?size=<w>x<h>` to the source url.
#[derive(Debug)]
pub struct MockCompositor {
    compositions: Arc<RwLock<Vec<RecordedComposition>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<CompositorError>>>,
}

impl Default for MockCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompositor {
    pub fn new() -> Self {
        Self {
            compositions: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Successful compositions, in call order.
    pub async fn compositions(&self) -> Vec<RecordedComposition> {
        self.compositions.read().await.clone()
    }

    pub async fn set_next_error(&self, error: CompositorError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl Compositor for MockCompositor {
    async fn compose(
        &self,
        code: &str,
        image_urls: &[String],
    ) -> Result<ComposedArtifact, CompositorError> {
        if let Some(e) = self.next_error.write().await.take() {
            return Err(e);
        }
        if image_urls.is_empty() {
            return Err(CompositorError::NoInputs);
        }
        self.compositions.write().await.push(RecordedComposition {
            code: code.to_string(),
            image_urls: image_urls.to_vec(),
        });
        Ok(ComposedArtifact {
            url: format!("https://cdn.example/{}.jpg", code),
            thumbnail_url: format!("https://cdn.example/{}_thumb.jpg", code),
        })
    }

    async fn thumbnail(
        &self,
        url: &str,
        width: u32,
        height: u32,
    ) -> Result<String, CompositorError> {
        if let Some(e) = self.next_error.write().await.take() {
            return Err(e);
        }
        Ok(format!("{}?size={}x{}", url, width, height))
    }
}
