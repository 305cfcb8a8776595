// Logging utilities for the Sealpost stack
//
// Component-scoped loggers over the `log` facade:
// - Component prefixes with an optional parent component
// - A context label identifying the caller (tenant, service, request)
// - Optional operation tracing for multi-step flows (sign -> envelope)

use log::{debug, error, info, warn, Level};
use std::fmt::{self, Arguments, Display, Formatter};

/// Predefined components for logging categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Workflow,
    Signer,
    Enveloper,
    Verifier,
    Decryptor,
    Issuer,
    Loader,
    TrustStore,
    Custom(&'static str),
}

impl Component {
    /// Get the string representation of the component
    pub fn as_str(&self) -> &str {
        match self {
            Component::Workflow => "Workflow",
            Component::Signer => "Signer",
            Component::Enveloper => "Enveloper",
            Component::Verifier => "Verifier",
            Component::Decryptor => "Decryptor",
            Component::Issuer => "Issuer",
            Component::Loader => "Loader",
            Component::TrustStore => "TrustStore",
            Component::Custom(name) => name,
        }
    }
}

// Display helper so the prefix is rendered without an intermediate String
struct PrefixDisplay<'a> {
    parent: Option<Component>,
    component: Component,
    operation: Option<&'a str>,
}

impl Display for PrefixDisplay<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.parent {
            Some(parent) if parent != Component::Workflow => {
                write!(f, "{}.{}", parent.as_str(), self.component.as_str())?
            }
            _ => write!(f, "{}", self.component.as_str())?,
        }
        if let Some(op) = self.operation {
            write!(f, "|op={op}")?;
        }
        Ok(())
    }
}

/// A component-specific logger carrying a context label
#[derive(Debug, Clone)]
pub struct Logger {
    /// Component this logger is for
    component: Component,
    /// Label identifying the caller context
    context: String,
    /// Parent component for hierarchical logging (if any)
    parent_component: Option<Component>,
    /// Operation path for multi-step flows
    operation: Option<String>,
}

impl Logger {
    /// Create a new root logger for a component and context label
    pub fn new_root(component: Component, context: &str) -> Self {
        Self {
            component,
            context: context.to_string(),
            parent_component: None,
            operation: None,
        }
    }

    /// Create a child logger with the same context but a different component
    pub fn with_component(&self, component: Component) -> Self {
        Self {
            component,
            context: self.context.clone(),
            parent_component: Some(self.component),
            operation: self.operation.clone(),
        }
    }

    /// Create a logger tagged with an operation name
    pub fn with_operation(&self, operation: impl Into<String>) -> Self {
        Self {
            component: self.component,
            context: self.context.clone(),
            parent_component: self.parent_component,
            operation: Some(operation.into()),
        }
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    fn prefix(&self) -> PrefixDisplay<'_> {
        PrefixDisplay {
            parent: self.parent_component,
            component: self.component,
            operation: self.operation(),
        }
    }

    fn emit(&self, level: Level, args: Arguments) {
        if !log::log_enabled!(level) {
            return;
        }
        let prefix = self.prefix();
        match level {
            Level::Error => error!("[{}][{}] {}", self.context, prefix, args),
            Level::Warn => warn!("[{}][{}] {}", self.context, prefix, args),
            Level::Info => info!("[{}][{}] {}", self.context, prefix, args),
            Level::Debug | Level::Trace => debug!("[{}][{}] {}", self.context, prefix, args),
        }
    }

    /// Log a debug message
    pub fn debug(&self, message: impl Into<String>) {
        if log::log_enabled!(Level::Debug) {
            self.emit(Level::Debug, format_args!("{}", message.into()));
        }
    }

    /// Log a debug message using fmt::Arguments (avoids allocating message String)
    pub fn debug_args(&self, args: Arguments) {
        self.emit(Level::Debug, args);
    }

    /// Log an info message
    pub fn info(&self, message: impl Into<String>) {
        if log::log_enabled!(Level::Info) {
            self.emit(Level::Info, format_args!("{}", message.into()));
        }
    }

    pub fn info_args(&self, args: Arguments) {
        self.emit(Level::Info, args);
    }

    /// Log a warning message
    pub fn warn(&self, message: impl Into<String>) {
        if log::log_enabled!(Level::Warn) {
            self.emit(Level::Warn, format_args!("{}", message.into()));
        }
    }

    pub fn warn_args(&self, args: Arguments) {
        self.emit(Level::Warn, args);
    }
}
