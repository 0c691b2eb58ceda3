//! Factory registries for building logging objects by type name.
//!
//! Each registry maps a type name (for example `"SocketAppender"`) to a
//! factory that builds the object from string [`Properties`]. The global
//! context owns one registry per product kind and fills them with the
//! built-in factories when it is created.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use encoding_rs::Encoding;
use log::warn;
use parking_lot::RwLock;
use thiserror::Error;

use crate::appender::SharedAppenderPtr;
use crate::filter::{FemtoFilter, LevelRangeFilter};
use crate::formatter::{DefaultFormatter, SharedFormatter};
use crate::level::FemtoLevel;

/// String key/value configuration handed to factories.
pub type Properties = BTreeMap<String, String>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// No factory is registered under the requested type name.
    #[error("no factory registered for type {0:?}")]
    UnknownType(String),
    #[error("missing required property {0:?}")]
    MissingProperty(&'static str),
    #[error("invalid value {value:?} for property {key:?}")]
    InvalidProperty { key: &'static str, value: String },
    /// The object rejected otherwise well-formed properties.
    #[error("failed to build object: {0}")]
    Build(String),
}

/// Builds one kind of object from properties.
pub trait Factory: Send + Sync {
    type Product;

    /// Name the factory is registered under.
    fn type_name(&self) -> &str;

    fn create(&self, properties: &Properties) -> Result<Self::Product, FactoryError>;
}

/// Registry of factories producing `P`.
pub struct FactoryRegistry<P> {
    factories: RwLock<BTreeMap<String, Arc<dyn Factory<Product = P>>>>,
}

impl<P> FactoryRegistry<P> {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register `factory` under its type name.
    ///
    /// Returns `false`, leaving the existing entry in place, if the name is
    /// already taken.
    pub fn register<F>(&self, factory: F) -> bool
    where
        F: Factory<Product = P> + 'static,
    {
        let name = factory.type_name().to_owned();
        let mut factories = self.factories.write();
        if factories.contains_key(&name) {
            warn!("FactoryRegistry: {name:?} is already registered");
            return false;
        }
        factories.insert(name, Arc::new(factory));
        true
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.read().contains_key(type_name)
    }

    /// Registered type names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<dyn Factory<Product = P>>> {
        self.factories.read().get(type_name).cloned()
    }

    /// Build a `type_name` object from `properties`.
    pub fn create(&self, type_name: &str, properties: &Properties) -> Result<P, FactoryError> {
        let factory = self
            .get(type_name)
            .ok_or_else(|| FactoryError::UnknownType(type_name.to_owned()))?;
        factory.create(properties)
    }
}

impl<P> Default for FactoryRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for FactoryRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("types", &self.names())
            .finish()
    }
}

pub type AppenderFactoryRegistry = FactoryRegistry<SharedAppenderPtr>;
pub type LayoutFactoryRegistry = FactoryRegistry<SharedFormatter>;
pub type FilterFactoryRegistry = FactoryRegistry<Arc<dyn FemtoFilter>>;
pub type LocaleFactoryRegistry = FactoryRegistry<Locale>;

/// Fetch a property that must be present.
pub fn required<'a>(properties: &'a Properties, key: &'static str) -> Result<&'a str, FactoryError> {
    properties
        .get(key)
        .map(String::as_str)
        .ok_or(FactoryError::MissingProperty(key))
}

/// Parse an optional property, falling back to `default` when absent.
pub fn parsed_or<T: FromStr>(
    properties: &Properties,
    key: &'static str,
    default: T,
) -> Result<T, FactoryError> {
    match properties.get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| FactoryError::InvalidProperty {
            key,
            value: value.clone(),
        }),
    }
}

/// Text encoding used by sinks that emit narrow bytes.
#[derive(Clone, Copy)]
pub struct Locale {
    encoding: &'static Encoding,
}

impl Locale {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self { encoding }
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Encode `text`, substituting characters the encoding cannot represent.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let (bytes, _, _) = self.encoding.encode(text);
        bytes.into_owned()
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _, _) = self.encoding.decode(bytes);
        text.into_owned()
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new(encoding_rs::UTF_8)
    }
}

impl fmt::Debug for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Locale").field(&self.name()).finish()
    }
}

/// Builds [`DefaultFormatter`] layouts; takes no properties.
pub struct DefaultFormatterFactory;

impl Factory for DefaultFormatterFactory {
    type Product = SharedFormatter;

    fn type_name(&self) -> &str {
        "DefaultFormatter"
    }

    fn create(&self, _properties: &Properties) -> Result<SharedFormatter, FactoryError> {
        Ok(SharedFormatter::new(DefaultFormatter))
    }
}

/// Builds [`LevelRangeFilter`]s from `min` and `max` level names.
pub struct LevelRangeFilterFactory;

impl Factory for LevelRangeFilterFactory {
    type Product = Arc<dyn FemtoFilter>;

    fn type_name(&self) -> &str {
        "LevelRangeFilter"
    }

    fn create(&self, properties: &Properties) -> Result<Arc<dyn FemtoFilter>, FactoryError> {
        let min = parsed_or(properties, "min", FemtoLevel::Trace)?;
        let max = parsed_or(properties, "max", FemtoLevel::Critical)?;
        if min > max {
            return Err(FactoryError::Build(format!(
                "min level {min} is above max level {max}"
            )));
        }
        Ok(Arc::new(LevelRangeFilter::new(min, max)))
    }
}

/// Builds a [`Locale`] from an `encoding` label, UTF-8 by default.
pub struct EncodingLocaleFactory;

impl Factory for EncodingLocaleFactory {
    type Product = Locale;

    fn type_name(&self) -> &str {
        "EncodingLocale"
    }

    fn create(&self, properties: &Properties) -> Result<Locale, FactoryError> {
        match properties.get("encoding") {
            None => Ok(Locale::default()),
            Some(label) => Encoding::for_label(label.trim().as_bytes())
                .map(Locale::new)
                .ok_or_else(|| FactoryError::InvalidProperty {
                    key: "encoding",
                    value: label.clone(),
                }),
        }
    }
}

/// Fill the four registries with the built-in factories.
pub fn register_default_factories(
    appenders: &AppenderFactoryRegistry,
    layouts: &LayoutFactoryRegistry,
    filters: &FilterFactoryRegistry,
    locales: &LocaleFactoryRegistry,
) {
    appenders.register(crate::socket_appender::SocketAppenderFactory);
    appenders.register(crate::null_appender::NullAppenderFactory);
    layouts.register(DefaultFormatterFactory);
    filters.register(LevelRangeFilterFactory);
    locales.register(EncodingLocaleFactory);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_record::FemtoLogRecord;
    use rstest::rstest;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    fn duplicate_registration_is_refused() {
        let registry = LayoutFactoryRegistry::new();
        assert!(registry.register(DefaultFormatterFactory));
        assert!(!registry.register(DefaultFormatterFactory));
        assert_eq!(registry.names(), ["DefaultFormatter"]);
    }

    #[rstest]
    fn unknown_type_is_reported() {
        let registry = FilterFactoryRegistry::new();
        assert!(matches!(
            registry.create("Nope", &Properties::new()),
            Err(FactoryError::UnknownType(name)) if name == "Nope"
        ));
    }

    #[rstest]
    fn level_range_filter_from_properties() {
        let filter = LevelRangeFilterFactory
            .create(&props(&[("min", "warn"), ("max", "error")]))
            .expect("valid range");
        assert!(filter.should_log(&FemtoLogRecord::new("a", FemtoLevel::Warn, "m")));
        assert!(!filter.should_log(&FemtoLogRecord::new("a", FemtoLevel::Info, "m")));
    }

    #[rstest]
    #[case(&[("min", "loud")], "min")]
    #[case(&[("max", "")], "max")]
    fn bad_level_names_are_invalid(#[case] pairs: &[(&str, &str)], #[case] key: &str) {
        let err = LevelRangeFilterFactory
            .create(&props(pairs))
            .err()
            .expect("invalid level");
        assert!(matches!(err, FactoryError::InvalidProperty { key: k, .. } if k == key));
    }

    #[rstest]
    fn locale_encodes_with_label() {
        let locale = EncodingLocaleFactory
            .create(&props(&[("encoding", "latin1")]))
            .expect("known label");
        assert_eq!(locale.name(), "windows-1252");
        assert_eq!(locale.encode("\u{e9}"), [0xE9_u8]);
        assert_eq!(locale.decode(&[0xE9]), "\u{e9}");
    }

    #[rstest]
    fn required_property_must_exist() {
        assert_eq!(
            required(&Properties::new(), "host"),
            Err(FactoryError::MissingProperty("host"))
        );
    }
}
