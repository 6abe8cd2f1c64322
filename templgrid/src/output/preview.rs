use crate::error::Result;
use crate::output::Output;
use crate::templates::BuildResult;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

pub const PREVIEW_FILE_NAME: &str = "preview.html";

/// Concatenates every template into a single `preview.html`.
pub struct PreviewOutput {
    path: PathBuf,
    content: String,
}

impl PreviewOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: String::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[async_trait]
impl Output for PreviewOutput {
    fn add(&mut self, name: &str, result: &BuildResult) -> Result<()> {
        self.content.push_str(&format!(
            "Name: {} Subject: {} {}",
            name, result.subject, result.html
        ));
        Ok(())
    }

    async fn push(&mut self) -> Result<()> {
        fs::create_dir_all(&self.path).await?;
        let file = self.path.join(PREVIEW_FILE_NAME);
        fs::write(&file, &self.content).await?;
        info!("Preview written to {}", file.display());
        Ok(())
    }
}
