//! Fluent builder and property factory for [`FemtoSocketAppender`].

use std::time::Duration;

use thiserror::Error;

use crate::appender::{SharedAppenderPtr, shared_appender};
use crate::spi::{Factory, FactoryError, Properties, parsed_or, required};

use super::appender::FemtoSocketAppender;
use super::config::{BackoffPolicy, DEFAULT_CHANNEL_CAPACITY, DEFAULT_PORT, SocketAppenderConfig};

/// Errors raised while validating appender configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppenderBuildError {
    #[error("invalid appender configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to start appender worker: {0}")]
    Spawn(String),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(AppenderBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $name:ident, $field:ident: $ty:ty) => {
        $(#[$meta])*
        pub fn $name(mut self, value: $ty) -> Self {
            self.$field = Some(value.into());
            self
        }
    };
}

/// Builder for socket appenders.
#[derive(Clone, Debug, Default)]
pub struct SocketAppenderBuilder {
    name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    server_name: Option<String>,
    capacity: Option<usize>,
    io_timeout: Option<Duration>,
    backoff: Option<BackoffPolicy>,
    warn_interval: Option<Duration>,
}

impl SocketAppenderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target collector address.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    option_setter!(with_name, name: impl Into<String>);
    option_setter!(
        /// Sender identity written into every record.
        with_server_name, server_name: impl Into<String>
    );
    option_setter!(with_capacity, capacity: usize);
    option_setter!(with_io_timeout, io_timeout: Duration);
    option_setter!(with_backoff, backoff: BackoffPolicy);
    option_setter!(with_warn_interval, warn_interval: Duration);

    /// Validate the settings and produce a worker configuration.
    pub fn build_config(&self) -> Result<SocketAppenderConfig, AppenderBuildError> {
        let defaults = SocketAppenderConfig::default();
        let host = self
            .host
            .clone()
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| AppenderBuildError::InvalidConfig("host must be set".into()))?;
        let port = ensure_positive!(self.port.unwrap_or(DEFAULT_PORT), "port")?;
        let capacity = ensure_positive!(
            self.capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
            "capacity"
        )?;
        let io_timeout = self.io_timeout.unwrap_or(defaults.io_timeout);
        ensure_positive!(io_timeout.as_millis(), "io_timeout")?;
        let backoff = self.backoff.clone().unwrap_or_default();
        ensure_positive!(backoff.base.as_millis(), "backoff base")?;
        if backoff.base > backoff.cap {
            return Err(AppenderBuildError::InvalidConfig(
                "backoff base must not exceed backoff cap".into(),
            ));
        }
        Ok(SocketAppenderConfig {
            name: self.name.clone().unwrap_or(defaults.name),
            host,
            port,
            server_name: self.server_name.clone().unwrap_or(defaults.server_name),
            capacity,
            io_timeout,
            backoff,
            warn_interval: self.warn_interval.unwrap_or(defaults.warn_interval),
        })
    }

    pub fn build(&self) -> Result<FemtoSocketAppender, AppenderBuildError> {
        let config = self.build_config()?;
        FemtoSocketAppender::with_config(config)
            .map_err(|err| AppenderBuildError::Spawn(err.to_string()))
    }
}

/// Builds socket appenders from `host`, `port`, `server_name`, `capacity`
/// and `name` properties. Only `host` is required.
pub struct SocketAppenderFactory;

impl Factory for SocketAppenderFactory {
    type Product = SharedAppenderPtr;

    fn type_name(&self) -> &str {
        "SocketAppender"
    }

    fn create(&self, properties: &Properties) -> Result<SharedAppenderPtr, FactoryError> {
        let mut builder = SocketAppenderBuilder::new()
            .with_tcp(
                required(properties, "host")?,
                parsed_or(properties, "port", DEFAULT_PORT)?,
            )
            .with_capacity(parsed_or(properties, "capacity", DEFAULT_CHANNEL_CAPACITY)?);
        if let Some(server_name) = properties.get("server_name") {
            builder = builder.with_server_name(server_name.as_str());
        }
        if let Some(name) = properties.get("name") {
            builder = builder.with_name(name.as_str());
        }
        let appender = builder
            .build()
            .map_err(|err| FactoryError::Build(err.to_string()))?;
        Ok(shared_appender(appender))
    }
}
