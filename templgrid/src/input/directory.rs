use crate::error::{Result, TemplgridError};
use crate::input::{EmailInput, InputProvider};
use crate::templates::names::{locale_code_from_file, template_name_from_file};
use crate::templates::{LocaleCatalog, LocaleTable};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Reads templates from three directory trees on disk.
///
/// Files are visited in sorted path order, so component merge order is
/// stable across runs. Only files with the configured extension are read;
/// locale catalogs are `.json` files holding a flat object of format strings.
#[derive(Debug, Clone)]
pub struct DirectoryInput {
    email_path: PathBuf,
    component_path: PathBuf,
    locale_path: Option<PathBuf>,
    extension: String,
    prefix: String,
}

impl DirectoryInput {
    pub fn new(email_path: impl Into<PathBuf>, component_path: impl Into<PathBuf>) -> Self {
        Self {
            email_path: email_path.into(),
            component_path: component_path.into(),
            locale_path: None,
            extension: "html".to_string(),
            prefix: String::new(),
        }
    }

    pub fn with_locale_path(mut self, locale_path: impl Into<PathBuf>) -> Self {
        self.locale_path = Some(locale_path.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Prepended to every email name.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

fn list_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(TemplgridError::Input(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            TemplgridError::Input(format!("Failed to scan {}: {}", root.display(), e))
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

async fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .map_err(|e| TemplgridError::Input(format!("Failed to read {}: {}", path.display(), e)))
}

fn parse_locale(path: &Path, data: &str) -> Result<LocaleTable> {
    let raw: HashMap<String, serde_json::Value> = serde_json::from_str(data).map_err(|e| {
        TemplgridError::Input(format!("Invalid locale file {}: {}", path.display(), e))
    })?;

    raw.into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok((key, s)),
            other => Err(TemplgridError::Input(format!(
                "Locale file {}: value of '{}' must be a string, got {}",
                path.display(),
                key,
                other
            ))),
        })
        .collect()
}

#[async_trait]
impl InputProvider for DirectoryInput {
    async fn get_components(&self) -> Result<Vec<String>> {
        let mut components = Vec::new();
        for path in list_files(&self.component_path, &self.extension)? {
            debug!("Reading component {}", path.display());
            components.push(read_file(&path).await?);
        }
        Ok(components)
    }

    async fn get_emails(&self) -> Result<Vec<EmailInput>> {
        let mut emails = Vec::new();
        for path in list_files(&self.email_path, &self.extension)? {
            let name = format!("{}{}", self.prefix, template_name_from_file(&path));
            debug!("Reading email template {} from {}", name, path.display());
            emails.push(EmailInput {
                name,
                source: read_file(&path).await?,
            });
        }
        Ok(emails)
    }

    async fn get_locales(&self) -> Result<LocaleCatalog> {
        let mut catalog = LocaleCatalog::new();
        let Some(root) = &self.locale_path else {
            return Ok(catalog);
        };
        if !root.exists() {
            warn!("Locale directory {} does not exist, localization disabled", root.display());
            return Ok(catalog);
        }

        for path in list_files(root, "json")? {
            let code = locale_code_from_file(&path);
            debug!("Reading locale {} from {}", code, path.display());
            let table = parse_locale(&path, &read_file(&path).await?)?;
            catalog.insert(&code, table);
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "components/b_footer.html", "{% macro footer() %}B{% endmacro %}");
        write(dir.path(), "components/a_header.html", "{% macro header() %}A{% endmacro %}");
        write(dir.path(), "components/notes.txt", "ignored");
        write(dir.path(), "emails/welcome_email.html", "{% block subject %}Hi{% endblock %}");
        write(dir.path(), "emails/account/password-reset.html", "{% block subject %}Reset{% endblock %}");
        write(dir.path(), "i10n/EN.json", r#"{"greeting": "Hello, %s!"}"#);
        dir
    }

    fn input(dir: &TempDir) -> DirectoryInput {
        DirectoryInput::new(dir.path().join("emails"), dir.path().join("components"))
            .with_locale_path(dir.path().join("i10n"))
    }

    #[tokio::test]
    async fn test_components_sorted_and_filtered() {
        let dir = fixture();
        let components = input(&dir).get_components().await.unwrap();

        assert_eq!(
            components,
            vec![
                "{% macro header() %}A{% endmacro %}",
                "{% macro footer() %}B{% endmacro %}",
            ]
        );
    }

    #[tokio::test]
    async fn test_email_names_with_prefix() {
        let dir = fixture();
        let emails = input(&dir).with_prefix("App").get_emails().await.unwrap();
        let names: Vec<&str> = emails.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["AppPasswordReset", "AppWelcomeEmail"]);
    }

    #[tokio::test]
    async fn test_locales_are_lowercased() {
        let dir = fixture();
        let catalog = input(&dir).get_locales().await.unwrap();

        assert_eq!(catalog.codes(), vec!["en"]);
        assert_eq!(catalog.resolve("en").unwrap()["greeting"], "Hello, %s!");
    }

    #[tokio::test]
    async fn test_missing_email_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = DirectoryInput::new(dir.path().join("nope"), dir.path())
            .get_emails()
            .await
            .unwrap_err();

        assert!(matches!(err, TemplgridError::Input(_)));
    }

    #[tokio::test]
    async fn test_non_string_locale_value_is_rejected() {
        let dir = fixture();
        write(dir.path(), "i10n/fr.json", r#"{"count": 3}"#);

        let err = input(&dir).get_locales().await.unwrap_err();
        assert!(err.to_string().contains("count"));
    }
}
