//! Functions exposed to template authors
//!
//! - `args(k1, v1, k2, v2, ...)` builds an ad-hoc mapping, handy for passing
//!   several values to a component macro.
//! - `__(key, ...values)` looks a message up in the active locale table and
//!   formats it with printf-style verbs. Missing keys render as an empty
//!   string.
//! - `unescape(s)` decodes HTML entities of pre-escaped locale strings. Also
//!   available as a filter.
//! - `sendgrid_param(name)` emits a `{{ name }}` placeholder that SendGrid
//!   fills in when the synced template is sent.

use crate::templates::locale::LocaleTable;
use crate::templates::printf::sprintf;
use minijinja::value::{Rest, Value, ValueKind};
use minijinja::{Environment, ErrorKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Failures of the `args` helper.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    #[error("function args requires even parameters count, got {0}")]
    OddArgs(usize),

    #[error("function args requires key as string at position {position}")]
    NonStringKey { position: usize },
}

impl From<ArgsError> for minijinja::Error {
    fn from(err: ArgsError) -> Self {
        minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string())
    }
}

/// Register the helper set on a template environment.
pub fn register(env: &mut Environment<'_>, locale: Arc<LocaleTable>) {
    env.add_function("args", args_function);
    env.add_function("__", move |key: String, values: Rest<Value>| {
        localize(&locale, &key, &values.0)
    });
    env.add_function("unescape", |s: String| unescape(&s));
    env.add_filter("unescape", |s: String| unescape(&s));
    env.add_function("sendgrid_param", sendgrid_param);
}

fn args_function(values: Rest<Value>) -> Result<Value, minijinja::Error> {
    Ok(Value::from(build_args(&values.0)?))
}

/// Pair up `key, value` arguments into a mapping.
pub fn build_args(values: &[Value]) -> Result<BTreeMap<String, Value>, ArgsError> {
    if values.len() % 2 != 0 {
        return Err(ArgsError::OddArgs(values.len()));
    }

    let mut map = BTreeMap::new();
    for (idx, pair) in values.chunks(2).enumerate() {
        let key = match (pair[0].kind(), pair[0].as_str()) {
            (ValueKind::String, Some(key)) => key.to_string(),
            _ => return Err(ArgsError::NonStringKey { position: idx * 2 }),
        };
        map.insert(key, pair[1].clone());
    }

    Ok(map)
}

/// Look up `key` and format it; an absent key yields an empty string.
pub fn localize(table: &LocaleTable, key: &str, values: &[Value]) -> String {
    match table.get(key) {
        Some(format) => sprintf(format, values),
        None => String::new(),
    }
}

/// Decode HTML entities (`&amp;`, `&eacute;`, `&#39;`, ...).
pub fn unescape(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

fn sendgrid_param(name: String) -> Value {
    Value::from_safe_string(format!("{{{{ {} }}}}", name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LocaleTable {
        let mut table = LocaleTable::new();
        table.insert("greeting".to_string(), "Hello, %s!".to_string());
        table.insert("count".to_string(), "%d new messages (%.1f%%)".to_string());
        table
    }

    #[test]
    fn test_localize_formats_known_key() {
        let rendered = localize(&table(), "greeting", &[Value::from("Bob")]);
        assert_eq!(rendered, "Hello, Bob!");
    }

    #[test]
    fn test_localize_missing_key_is_empty() {
        let rendered = localize(&LocaleTable::new(), "greeting", &[Value::from("Bob")]);
        assert_eq!(rendered, "");
    }

    #[test]
    fn test_sprintf_numeric_verbs() {
        let rendered = localize(&table(), "count", &[Value::from(3), Value::from(12.345)]);
        assert_eq!(rendered, "3 new messages (12.3%)");
    }

    #[test]
    fn test_localize_reordered_arguments() {
        let mut table = LocaleTable::new();
        table.insert("signed".to_string(), "%[2]s, from %[1]s".to_string());

        let rendered = localize(&table, "signed", &[Value::from("Ann"), Value::from("Cheers")]);
        assert_eq!(rendered, "Cheers, from Ann");
    }

    #[test]
    fn test_args_builds_mapping() {
        let map = build_args(&[
            Value::from("a"),
            Value::from(1),
            Value::from("b"),
            Value::from(2),
        ])
        .unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], Value::from(1));
        assert_eq!(map["b"], Value::from(2));
    }

    #[test]
    fn test_args_rejects_odd_count() {
        let err = build_args(&[Value::from("a"), Value::from(1), Value::from("b")]).unwrap_err();
        assert_eq!(err, ArgsError::OddArgs(3));
    }

    #[test]
    fn test_args_rejects_non_string_key() {
        let err = build_args(&[Value::from(1), Value::from("x")]).unwrap_err();
        assert_eq!(err, ArgsError::NonStringKey { position: 0 });
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("Caf&eacute; &amp; bar"), "Café & bar");
    }

    #[test]
    fn test_sendgrid_param_placeholder() {
        assert_eq!(sendgrid_param("first_name".to_string()).to_string(), "{{ first_name }}");
    }
}
