use crate::error::{Result, TemplgridError};
use crate::output::Output;
use crate::templates::BuildResult;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Writes the HTML body of each template to `<path>/<Name>.html`.
pub struct DirectoryOutput {
    path: PathBuf,
    pending: Vec<(String, String)>,
}

impl DirectoryOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pending: Vec::new(),
        }
    }

    fn file_for(&self, name: &str) -> PathBuf {
        self.path.join(format!("{}.html", name))
    }
}

#[async_trait]
impl Output for DirectoryOutput {
    fn add(&mut self, name: &str, result: &BuildResult) -> Result<()> {
        self.pending.push((name.to_string(), result.html.clone()));
        Ok(())
    }

    async fn push(&mut self) -> Result<()> {
        fs::create_dir_all(&self.path).await.map_err(|e| {
            TemplgridError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create directory {}: {}", self.path.display(), e),
            ))
        })?;

        for (name, html) in std::mem::take(&mut self.pending) {
            let file = self.file_for(&name);
            fs::write(&file, html).await?;
            info!("Template {} written to {}", name, file.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_one_file_per_template() {
        let dir = TempDir::new().unwrap();
        let mut output = DirectoryOutput::new(dir.path().join("build"));

        output
            .add(
                "Welcome",
                &BuildResult {
                    subject: "Hi".to_string(),
                    html: "<p>Welcome</p>".to_string(),
                },
            )
            .unwrap();
        output.push().await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("build/Welcome.html")).unwrap();
        assert_eq!(written, "<p>Welcome</p>");
    }
}
