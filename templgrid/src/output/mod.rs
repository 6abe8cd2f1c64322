//! Destinations for rendered templates
//!
//! Outputs collect results with `add` and persist them with `push` once the
//! whole registry has been rendered.

pub mod directory;
pub mod preview;

use crate::error::Result;
use crate::templates::BuildResult;
use async_trait::async_trait;

pub use directory::DirectoryOutput;
pub use preview::{PreviewOutput, PREVIEW_FILE_NAME};

#[async_trait]
pub trait Output: Send {
    /// Collect the rendering of one template.
    fn add(&mut self, name: &str, result: &BuildResult) -> Result<()>;

    /// Persist everything collected so far.
    async fn push(&mut self) -> Result<()>;
}
