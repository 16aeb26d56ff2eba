//! Structured events built from errors and messages.
//!
//! An [`Event`] is constructed once per capture, enriched by a
//! [`Scope`](crate::Scope), and then converted into its canonical wire hash.
//! Conversion goes through serde exactly once, so every downstream component
//! sees the same string-keyed, sorted mapping regardless of how the event was
//! built.
//!
//! Errors participate through the [`Reportable`] capability. A reportable
//! error names its type, renders its value, optionally walks its causes, and
//! may carry context that is merged into the event it produces.

use std::{borrow::Cow, collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{CoreError, Result},
    models::{EventId, Level, WireHash},
};

/// Platform reported for every event.
pub const PLATFORM: &str = "rust";

/// Logger name used when none is configured.
pub const DEFAULT_LOGGER: &str = "flare";

/// SDK name reported in the `sdk` interface.
pub const SDK_NAME: &str = "flare-rust";

/// Caller-supplied attributes for an event.
///
/// Options layer on top of each other with [`EventOptions::merge`]: scalar
/// fields from the overriding side win when set, map fields are merged
/// key-by-key with the overriding side winning on conflict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventOptions {
    /// Severity override.
    pub level: Option<Level>,
    /// Logger name.
    pub logger: Option<String>,
    /// Release identifier of the running application.
    pub release: Option<String>,
    /// Deployment environment.
    pub environment: Option<String>,
    /// Host name.
    pub server_name: Option<String>,
    /// Transaction or culprit name.
    pub transaction: Option<String>,
    /// Grouping fingerprint. Replaced wholesale, never merged.
    pub fingerprint: Option<Vec<String>>,
    /// Indexed tags.
    pub tags: BTreeMap<String, String>,
    /// Arbitrary extra data.
    pub extra: Map<String, Value>,
    /// User interface fields.
    pub user: Map<String, Value>,
    /// HTTP request interface fields.
    pub request: Map<String, Value>,
}

impl EventOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds an extra value.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Adds a user field.
    pub fn user(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.user.insert(key.into(), value.into());
        self
    }

    /// Adds a request field.
    pub fn request(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.insert(key.into(), value.into());
        self
    }

    /// Sets the release.
    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    /// Sets the environment.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Sets the transaction name.
    pub fn transaction(mut self, transaction: impl Into<String>) -> Self {
        self.transaction = Some(transaction.into());
        self
    }

    /// Layers `overriding` on top of `self`.
    pub fn merge(mut self, overriding: EventOptions) -> Self {
        self.level = overriding.level.or(self.level);
        self.logger = overriding.logger.or(self.logger);
        self.release = overriding.release.or(self.release);
        self.environment = overriding.environment.or(self.environment);
        self.server_name = overriding.server_name.or(self.server_name);
        self.transaction = overriding.transaction.or(self.transaction);
        self.fingerprint = overriding.fingerprint.or(self.fingerprint);
        self.tags.extend(overriding.tags);
        self.extra.extend(overriding.extra);
        self.user.extend(overriding.user);
        self.request.extend(overriding.request);
        self
    }
}

/// How an error exposes context to merge into its event.
#[derive(Debug)]
pub enum ContextCapability<'a> {
    /// Context stored on the error value itself.
    Attached(&'a EventOptions),
    /// Context computed on demand by the error.
    Method(EventOptions),
    /// The error carries no context.
    None,
}

impl ContextCapability<'_> {
    /// Resolves the capability into owned options.
    pub fn resolve(self) -> EventOptions {
        match self {
            Self::Attached(options) => options.clone(),
            Self::Method(options) => options,
            Self::None => EventOptions::default(),
        }
    }
}

/// An error that can be turned into an event.
pub trait Reportable: fmt::Display + fmt::Debug + Send + Sync {
    /// Type name of the error as reported in `exception.values[].type`.
    fn type_name(&self) -> Cow<'_, str>;

    /// Context this error contributes to its event.
    fn context(&self) -> ContextCapability<'_> {
        ContextCapability::None
    }

    /// Exception entries for this error and its causes, root cause first.
    fn exception_values(&self) -> Vec<ExceptionValue> {
        vec![ExceptionValue::new(self.type_name(), self.to_string())]
    }
}

/// A captured `std::error::Error` with its source chain.
///
/// The outermost type name is the full path of the static type, e.g.
/// `std::io::error::Error`. Causes are reached through `source()` and named
/// from their `Debug` output, since the static type behind a `dyn Error` is
/// not recoverable.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    type_name: String,
    value: String,
    causes: Vec<ExceptionValue>,
    context: Option<EventOptions>,
}

impl ErrorReport {
    /// Captures an error and walks its `source()` chain.
    pub fn from_error<E: std::error::Error + ?Sized + 'static>(error: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(ExceptionValue::new(
                type_name_from_debug(&format!("{cause:?}")),
                cause.to_string(),
            ));
            source = cause.source();
        }

        Self {
            type_name: strip_generics(std::any::type_name::<E>()).to_string(),
            value: error.to_string(),
            causes,
            context: None,
        }
    }

    /// Creates a report from a raw type name and value.
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), value: value.into(), causes: Vec::new(), context: None }
    }

    /// Attaches context that will be merged into the resulting event.
    pub fn with_context(mut self, context: EventOptions) -> Self {
        self.context = Some(context);
        self
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl Reportable for ErrorReport {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.type_name)
    }

    fn context(&self) -> ContextCapability<'_> {
        match &self.context {
            Some(options) => ContextCapability::Attached(options),
            None => ContextCapability::None,
        }
    }

    fn exception_values(&self) -> Vec<ExceptionValue> {
        let mut values: Vec<ExceptionValue> = self.causes.iter().rev().cloned().collect();
        values.push(ExceptionValue::new(self.type_name.as_str(), self.value.as_str()));
        values
    }
}

/// One entry of the exception interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionValue {
    /// Exception type name.
    #[serde(rename = "type")]
    pub ty: String,
    /// Rendered exception message.
    pub value: String,
    /// Module path the type lives in, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl ExceptionValue {
    /// Creates an entry, splitting a `module::Type` path when present.
    pub fn new(ty: impl Into<String>, value: impl Into<String>) -> Self {
        let ty = ty.into();
        let (module, ty) = match ty.rsplit_once("::") {
            Some((module, name)) => (Some(module.to_string()), name.to_string()),
            None => (None, ty),
        };
        Self { ty, value: value.into(), module }
    }
}

/// Exception interface, root cause first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInterface {
    /// Exception entries.
    pub values: Vec<ExceptionValue>,
}

/// SDK identification attached to each event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdk {
    /// SDK name.
    pub name: String,
    /// SDK version.
    pub version: String,
}

impl Default for Sdk {
    fn default() -> Self {
        Self { name: SDK_NAME.to_string(), version: env!("CARGO_PKG_VERSION").to_string() }
    }
}

/// Extra information passed to the before-send hook alongside the event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hint {
    /// Outermost exception entry when the event came from an error.
    pub exception: Option<ExceptionValue>,
    /// Message text when the event came from a message.
    pub message: Option<String>,
}

impl Hint {
    /// Hint for an event built from an error.
    pub fn from_exception(exception: &dyn Reportable) -> Self {
        Self {
            exception: Some(ExceptionValue::new(exception.type_name(), exception.to_string())),
            message: None,
        }
    }

    /// Hint for an event built from a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self { exception: None, message: Some(message.into()) }
    }
}

/// Structured representation of a captured error or message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub event_id: EventId,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: Level,
    /// Reporting platform.
    pub platform: String,
    /// Logger name.
    pub logger: String,
    /// Message text for message events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Exception chain for error events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInterface>,
    /// Release identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// Deployment environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Transaction or culprit name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// Grouping fingerprint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fingerprint: Vec<String>,
    /// Indexed tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Arbitrary extra data.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    /// User interface.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub user: Map<String, Value>,
    /// Structured contexts (runtime, os, app, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub contexts: Map<String, Value>,
    /// HTTP request interface.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub request: Map<String, Value>,
    /// SDK identification.
    pub sdk: Sdk,
}

impl Event {
    /// Creates an empty event with the given options applied.
    pub fn new(options: EventOptions) -> Self {
        let mut event = Self {
            event_id: EventId::new(),
            timestamp: Utc::now(),
            level: Level::Error,
            platform: PLATFORM.to_string(),
            logger: DEFAULT_LOGGER.to_string(),
            message: None,
            exception: None,
            release: None,
            environment: None,
            server_name: None,
            transaction: None,
            fingerprint: Vec::new(),
            tags: BTreeMap::new(),
            extra: Map::new(),
            user: Map::new(),
            contexts: Map::new(),
            request: Map::new(),
            sdk: Sdk::default(),
        };
        event.apply_options(options);
        event
    }

    /// Builds a message-only event.
    pub fn from_message(message: impl Into<String>, options: EventOptions) -> Self {
        let mut event = Self::new(options);
        event.message = Some(message.into());
        event
    }

    /// Builds an event from an error.
    ///
    /// Context exposed by the error is merged underneath `options`, so caller
    /// options win on conflict.
    pub fn from_exception(exception: &dyn Reportable, options: EventOptions) -> Self {
        Self::from_exception_with_defaults(exception, EventOptions::default(), options)
    }

    /// Builds an event from an error, layering `defaults`, then the error's
    /// own context, then `options`.
    pub fn from_exception_with_defaults(
        exception: &dyn Reportable,
        defaults: EventOptions,
        options: EventOptions,
    ) -> Self {
        let merged = defaults.merge(exception.context().resolve()).merge(options);
        let mut event = Self::new(merged);
        event.exception = Some(ExceptionInterface { values: exception.exception_values() });
        event
    }

    fn apply_options(&mut self, options: EventOptions) {
        if let Some(level) = options.level {
            self.level = level;
        }
        if let Some(logger) = options.logger {
            self.logger = logger;
        }
        if let Some(fingerprint) = options.fingerprint {
            self.fingerprint = fingerprint;
        }
        self.release = options.release.or(self.release.take());
        self.environment = options.environment.or(self.environment.take());
        self.server_name = options.server_name.or(self.server_name.take());
        self.transaction = options.transaction.or(self.transaction.take());
        self.tags.extend(options.tags);
        self.extra.extend(options.extra);
        self.user.extend(options.user);
        self.request.extend(options.request);
    }

    /// Canonical wire hash of this event.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Serialization` if a contained value cannot be
    /// represented as JSON.
    pub fn to_hash(&self) -> Result<WireHash> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(CoreError::NotAnObject { kind: json_kind(&other) }),
        }
    }

    /// Transport-safe representation for handing the event across an async
    /// boundary. Contains only plain JSON values.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Event::to_hash`].
    pub fn to_wire_compatible_hash(&self) -> Result<Value> {
        self.to_hash().map(Value::Object)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strips generic arguments, `a::B<c::D>` becomes `a::B`.
fn strip_generics(full: &str) -> &str {
    full.split('<').next().unwrap_or(full)
}

/// Takes the leading identifier of a `Debug` rendering, e.g. `Custom` from
/// `Custom { kind: Other, .. }`.
fn type_name_from_debug(debug: &str) -> String {
    let end = debug
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == ':'))
        .unwrap_or(debug.len());
    let name = &debug[..end];
    if name.is_empty() {
        "Error".to_string()
    } else {
        name.to_string()
    }
}
