//! Contract for the external texture conversion step.

use oven_core::compute::CancellationToken;
use oven_core::texture::TextureUsage;

use crate::error::TextureError;

/// Inputs for one texture conversion.
///
/// Everything here is immutable from the job's point of view; results go back
/// to the registry over its completion channel.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    /// Original encoded image bytes.
    pub source: &'a [u8],
    /// Canonical URL of the source.
    pub url: &'a str,
    /// How materials use the texture.
    pub usage: TextureUsage,
    /// File name the baked bytes will be written under.
    pub output_name: &'a str,
    /// Cancellation shared with the owning registry.
    pub cancel: &'a CancellationToken,
}

/// Turns source image bytes into baked texture bytes.
///
/// Implementations run on worker threads and should return
/// [`TextureError::Cancelled`] early once `cancel` is set. A converter that
/// ignores cancellation is still correct; its result is discarded.
pub trait TextureConverter: Send + Sync {
    /// Convert one texture.
    fn convert(&self, request: ConversionRequest<'_>) -> Result<Vec<u8>, TextureError>;
}
