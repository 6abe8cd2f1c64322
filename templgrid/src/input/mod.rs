//! Template sources
//!
//! An input provider yields the three raw ingredients of the registry:
//! component fragments (ordered), email sources (named) and locale tables.

pub mod directory;

use crate::error::Result;
use crate::templates::{LocaleCatalog, TemplateRegistry};
use async_trait::async_trait;
use tracing::info;

pub use directory::DirectoryInput;

/// Raw email source with its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailInput {
    pub name: String,
    pub source: String,
}

#[async_trait]
pub trait InputProvider: Send + Sync {
    /// Component fragments in merge order.
    async fn get_components(&self) -> Result<Vec<String>>;

    async fn get_emails(&self) -> Result<Vec<EmailInput>>;

    async fn get_locales(&self) -> Result<LocaleCatalog>;
}

/// Load everything an input provider has into `registry`.
pub async fn load_registry(input: &dyn InputProvider, registry: &TemplateRegistry) -> Result<()> {
    let components = input.get_components().await?;
    let emails = input.get_emails().await?;
    let locales = input.get_locales().await?;

    info!(
        "Loaded {} components, {} emails, {} locales",
        components.len(),
        emails.len(),
        locales.len()
    );

    registry.set_components(components);
    registry.set_locales(locales);
    for email in emails {
        registry.register(email.name, email.source);
    }

    Ok(())
}
