//! Template composition: components + email source -> minified HTML
//!
//! An email source defines its two blocks with Jinja syntax:
//!
//! ```text
//! {% block subject %}{{ __("welcome.subject") }}{% endblock %}
//! {% block email_body %}{{ header(title="Welcome") }}<p>Hi {{ name }}</p>{% endblock %}
//! ```
//!
//! Components are fragments defining macros (`{% macro header(title) %}`).
//! They are merged in list order ahead of the email source, so a macro
//! defined by a later component replaces an earlier one with the same name.

use crate::error::{Result, TemplgridError};
use crate::templates::functions;
use crate::templates::locale::LocaleTable;
use minify_html::Cfg;
use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Named block extracted from an email source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Block {
    Subject,
    EmailBody,
}

impl Block {
    /// Public block name (`subject`, `email-body`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Block::Subject => "subject",
            Block::EmailBody => "email-body",
        }
    }

    /// Identifier used in the template source (`{% block email_body %}`).
    pub fn source_name(&self) -> &'static str {
        match self {
            Block::Subject => "subject",
            Block::EmailBody => "email_body",
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendered subject and HTML body of one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub subject: String,
    pub html: String,
}

/// Renders email blocks against a fixed component list and locale table.
#[derive(Debug, Clone)]
pub struct Compositor {
    components: Arc<Vec<String>>,
    locale: Arc<LocaleTable>,
}

impl Compositor {
    pub fn new(components: Arc<Vec<String>>, locale: Arc<LocaleTable>) -> Self {
        Self { components, locale }
    }

    /// Compositor with no components and no localization.
    pub fn plain() -> Self {
        Self::new(Arc::new(Vec::new()), Arc::new(LocaleTable::new()))
    }

    /// Render one block of `source`.
    ///
    /// The email body is HTML: values are auto-escaped and the result is
    /// minified. The subject is plain text: nothing is escaped, entities are
    /// decoded and whitespace runs collapse to a single space.
    ///
    /// Undefined parameters render as empty, and attribute access on them
    /// stays undefined, so optional fields can be tested with `{% if %}`.
    pub fn render(
        &self,
        name: &str,
        source: &str,
        block: Block,
        params: &serde_json::Value,
    ) -> Result<String> {
        let mut merged = self.components.join("\n");
        merged.push('\n');
        merged.push_str(source);

        let escape = match block {
            Block::Subject => AutoEscape::None,
            Block::EmailBody => AutoEscape::Html,
        };

        let mut env = Environment::new();
        env.set_auto_escape_callback(move |_| escape.clone());
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        functions::register(&mut env, Arc::clone(&self.locale));

        for (idx, component) in self.components.iter().enumerate() {
            env.template_from_str(component)
                .map_err(|e| TemplgridError::Composition {
                    template: name.to_string(),
                    message: format!("component #{}: {}", idx, e),
                })?;
        }

        let template = env
            .template_from_named_str(name, &merged)
            .map_err(|e| TemplgridError::Composition {
                template: name.to_string(),
                message: e.to_string(),
            })?;

        let render_err = |e: minijinja::Error| TemplgridError::Render {
            template: name.to_string(),
            block: block.to_string(),
            message: describe(&e),
        };

        let (_, mut state) = template
            .render_and_return_state(context(params))
            .map_err(render_err)?;
        let raw = state.render_block(block.source_name()).map_err(render_err)?;

        debug!("Rendered block {} of {} ({} bytes)", block, name, raw.len());

        match block {
            Block::Subject => Ok(plain_text(&raw)),
            Block::EmailBody => minify(&raw).map_err(|e| TemplgridError::Minify {
                template: name.to_string(),
                block: block.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Render both blocks of an email with the same components and locale.
    pub fn build(&self, name: &str, source: &str, params: &serde_json::Value) -> Result<BuildResult> {
        let subject = self.render(name, source, Block::Subject, params)?;
        let html = self.render(name, source, Block::EmailBody, params)?;
        Ok(BuildResult { subject, html })
    }
}

/// Minify rendered HTML. Identical input always yields identical output.
///
/// minify-html passes malformed markup through instead of rejecting it, so
/// the only failure left is output that is not valid UTF-8.
pub fn minify(html: &str) -> std::result::Result<String, std::string::FromUtf8Error> {
    let mut cfg = Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.preserve_brace_template_syntax = true;
    cfg.minify_css = true;

    String::from_utf8(minify_html::minify(html.as_bytes(), &cfg))
}

/// Normalize a rendered subject line.
pub fn plain_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn context(params: &serde_json::Value) -> Value {
    match params {
        serde_json::Value::Null => Value::from_serialize(serde_json::Map::new()),
        other => Value::from_serialize(other),
    }
}

// Keep the root cause of helper failures in the message.
fn describe(err: &minijinja::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
