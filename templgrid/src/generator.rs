//! One-shot generation pipeline
//!
//! Loads every template from the input, renders each one with an empty
//! parameter bag, feeds the results to the configured outputs and finally
//! converges the remote store when synchronization is enabled.

use crate::config::AppConfig;
use crate::error::{Result, TemplgridError};
use crate::input::{load_registry, DirectoryInput, InputProvider};
use crate::output::{DirectoryOutput, Output, PreviewOutput};
use crate::sync::{Reconciler, SendGridStore, SyncReport};
use crate::templates::{BuildResult, TemplateRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// An output together with the locale its templates are rendered in.
pub struct OutputTarget {
    pub locale: String,
    pub output: Box<dyn Output>,
}

pub struct Generator {
    input: Box<dyn InputProvider>,
    registry: Arc<TemplateRegistry>,
    outputs: Vec<OutputTarget>,
    sync: Option<(Reconciler, String)>,
}

/// What a generation run produced.
#[derive(Debug, Default)]
pub struct GenerationSummary {
    pub templates: usize,
    pub sync: Option<SyncReport>,
}

impl Generator {
    pub fn new(input: Box<dyn InputProvider>, registry: Arc<TemplateRegistry>) -> Self {
        Self {
            input,
            registry,
            outputs: Vec::new(),
            sync: None,
        }
    }

    /// Wire input, outputs and synchronization from configuration.
    pub fn from_config(config: &AppConfig, registry: Arc<TemplateRegistry>) -> Self {
        let mut generator = Self::new(Box::new(directory_input(config)), registry);

        let output = &config.output;
        if output.directory.enabled {
            generator = generator.with_output(
                output.directory.locale.clone(),
                Box::new(DirectoryOutput::new(&output.directory.path)),
            );
        }
        if output.preview.enabled {
            generator = generator.with_output(
                output.preview.locale.clone(),
                Box::new(PreviewOutput::new(&output.preview.path)),
            );
        }

        if config.sync.enabled {
            let store = SendGridStore::new(config.sync.sendgrid.api_key.clone())
                .with_host(config.sync.sendgrid.host.clone());
            let reconciler = Reconciler::new(Arc::new(store), config.sync.options());
            generator = generator.with_sync(reconciler, config.sync.locale.clone());
        }

        generator
    }

    pub fn with_output(mut self, locale: impl Into<String>, output: Box<dyn Output>) -> Self {
        self.outputs.push(OutputTarget {
            locale: locale.into(),
            output,
        });
        self
    }

    /// Synchronize templates rendered in `locale` after the outputs are written.
    pub fn with_sync(mut self, reconciler: Reconciler, locale: impl Into<String>) -> Self {
        self.sync = Some((reconciler, locale.into()));
        self
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    /// Render every registered template for `locale`.
    ///
    /// The first failure aborts with the template name in the error.
    pub fn render_all(&self, locale: &str) -> Result<BTreeMap<String, BuildResult>> {
        render_all_from(&self.registry, locale)
    }

    pub async fn generate(&mut self, cancel: &CancellationToken) -> Result<GenerationSummary> {
        load_registry(self.input.as_ref(), &self.registry).await?;

        let mut rendered_by_locale: BTreeMap<String, BTreeMap<String, BuildResult>> =
            BTreeMap::new();
        let mut summary = GenerationSummary {
            templates: self.registry.len(),
            sync: None,
        };

        for target in &mut self.outputs {
            if !rendered_by_locale.contains_key(&target.locale) {
                let rendered = render_all_from(&self.registry, &target.locale)?;
                rendered_by_locale.insert(target.locale.clone(), rendered);
            }
            let rendered = &rendered_by_locale[&target.locale];

            for (name, result) in rendered {
                info!("Adding template {}", name);
                target.output.add(name, result)?;
            }
            target.output.push().await?;
        }

        if let Some((reconciler, locale)) = &mut self.sync {
            if cancel.is_cancelled() {
                return Err(TemplgridError::Cancelled);
            }
            let desired = match rendered_by_locale.remove(locale.as_str()) {
                Some(rendered) => rendered,
                None => render_all_from(&self.registry, locale)?,
            };
            summary.sync = Some(reconciler.reconcile(&desired, cancel).await?);
        }

        info!("Generation completed: {} templates", summary.templates);
        Ok(summary)
    }
}

/// Directory input described by the `[input]` section.
pub fn directory_input(config: &AppConfig) -> DirectoryInput {
    let input = &config.input;
    let mut provider = DirectoryInput::new(&input.email_path, &input.component_path)
        .with_extension(input.extension.clone())
        .with_prefix(input.prefix.clone());
    if !input.locale_path.is_empty() {
        provider = provider.with_locale_path(&input.locale_path);
    }
    provider
}

fn render_all_from(
    registry: &TemplateRegistry,
    locale: &str,
) -> Result<BTreeMap<String, BuildResult>> {
    let snapshot = registry.snapshot();
    let params = serde_json::Value::Null;

    snapshot
        .templates()
        .map(|template| {
            debug!("Rendering template {}", template.name);
            snapshot
                .build(&template.name, locale, &params)
                .map(|result| (template.name.clone(), result))
        })
        .collect()
}
