//! Generative fallback seam.

use crate::error::Result;
use crate::models::ClassificationContext;
use async_trait::async_trait;

/// Proposes a term for a label the vocabulary could not resolve.
///
/// `Ok(None)` means the generator had no suggestion. The standardizer bounds
/// every call with a timeout and treats errors like `Ok(None)`.
#[async_trait]
pub trait TermGenerator: Send + Sync {
    async fn generate(
        &self,
        raw_label: &str,
        category: &str,
        context: &ClassificationContext,
    ) -> Result<Option<String>>;
}
