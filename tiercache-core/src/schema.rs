//! # Schema registry
//!
//! The compiled table of static keys (fixed names and `${param}` templates)
//! to their value types and defaults, plus the resolver that maps a concrete
//! runtime key back to the schema entry it instantiates.

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::template::{self, TemplateMatcher};

/// A static cache key with a compile-time value type and default.
///
/// Usually declared with the `#[cache_key]` attribute, but it can be
/// implemented by hand:
///
/// ```
/// use tiercache_core::StaticKey;
///
/// pub struct UiTheme;
///
/// impl StaticKey for UiTheme {
///     const NAME: &'static str = "ui.theme";
///     type Value = String;
///
///     fn default_value() -> String {
///         "system".to_string()
///     }
/// }
///
/// assert!(!UiTheme::is_template());
/// ```
pub trait StaticKey {
    /// The key name, possibly containing `${param}` placeholders.
    const NAME: &'static str;

    /// The type stored under this key.
    type Value: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Value returned when no entry has been set.
    fn default_value() -> Self::Value;

    /// True if [`NAME`](Self::NAME) is a template.
    fn is_template() -> bool {
        template::is_template(Self::NAME)
    }
}

/// One declared key of the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub name: String,
    pub value_type: String,
    pub default: Value,
    pub template: bool,
}

/// Read-only table of declared keys.
///
/// Declaration order is kept: it decides which template wins when several
/// could match the same concrete key.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tiercache_core::Schema;
///
/// let schema = Schema::builder()
///     .entry("ui.theme", "String", json!("system"))
///     .entry("ocr/provider/${id}", "ProviderConfig", json!({"enabled": false}))
///     .build();
///
/// assert_eq!(schema.resolve("ui.theme").unwrap().default, json!("system"));
/// assert_eq!(
///     schema.resolve("ocr/provider/system").unwrap().name,
///     "ocr/provider/${id}"
/// );
/// assert!(schema.resolve("ocr/provider/").is_none());
/// ```
#[derive(Debug, Default)]
pub struct Schema {
    entries: Vec<SchemaEntry>,
    index: HashMap<String, usize>,
    matchers: OnceCell<Vec<TemplateMatcher>>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// An empty schema: every key is casual.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Exact lookup by declared name (template names included).
    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Resolves a concrete key to the schema entry providing its default.
    ///
    /// Exact names win; otherwise templates are tried in declaration order and
    /// the first whose matcher accepts the whole key is returned. `None`
    /// means a casual key without a declared default.
    pub fn resolve(&self, key: &str) -> Option<&SchemaEntry> {
        if let Some(entry) = self.get(key) {
            return Some(entry);
        }

        self.matchers()
            .iter()
            .find(|matcher| matcher.matches(key))
            .map(|matcher| &self.entries[matcher.index])
    }

    /// Default for a concrete key, or `None` for a casual key.
    pub fn default_for(&self, key: &str) -> Option<&Value> {
        self.resolve(key).map(|entry| &entry.default)
    }

    /// True if `key` is declared verbatim and is not a template.
    pub fn is_fixed_key(&self, key: &str) -> bool {
        self.get(key).map_or(false, |entry| !entry.template)
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matchers(&self) -> &[TemplateMatcher] {
        self.matchers.get_or_init(|| {
            self.entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.template)
                .filter_map(|(index, entry)| match template::compile(&entry.name) {
                    Ok(regex) => Some(TemplateMatcher::new(index, regex)),
                    Err(err) => {
                        tracing::error!(template = %entry.name, error = %err, "skipping template key with invalid matcher");
                        None
                    }
                })
                .collect()
        })
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entries: Vec<SchemaEntry>,
}

impl SchemaBuilder {
    /// Declares a typed static key.
    pub fn key<K: StaticKey>(self) -> Self {
        let value_type = std::any::type_name::<K::Value>();
        match serde_json::to_value(K::default_value()) {
            Ok(default) => self.entry(K::NAME, value_type, default),
            Err(err) => {
                tracing::error!(key = K::NAME, error = %err, "default value cannot be serialized; key not declared");
                self
            }
        }
    }

    /// Declares a key from its name, type label and JSON default.
    pub fn entry(mut self, name: &str, value_type: &str, default: Value) -> Self {
        if self.entries.iter().any(|entry| entry.name == name) {
            tracing::warn!(key = name, "duplicate schema key ignored; first declaration kept");
            return self;
        }
        self.entries.push(SchemaEntry {
            name: name.to_string(),
            value_type: value_type.to_string(),
            default,
            template: template::is_template(name),
        });
        self
    }

    pub fn build(self) -> Schema {
        let index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.name.clone(), i))
            .collect();
        Schema {
            entries: self.entries,
            index,
            matchers: OnceCell::new(),
        }
    }
}
