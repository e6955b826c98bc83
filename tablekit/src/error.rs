//! Error types

/// Errors surfaced by the table facade.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// `TableOptions` were built without an identity function.
    #[error("table options are missing a get_id function")]
    MissingGetId,

    /// A plugin's `configure` call failed.
    #[error("plugin `{plugin}` failed to configure: {source}")]
    Configure {
        /// Name of the failing plugin.
        plugin: String,
        /// Underlying plugin error.
        #[source]
        source: PluginError,
    },

    /// An event name outside the closed vocabulary.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// The payload shape does not match what the event carries.
    #[error("event `{event}` expects a {expected} payload")]
    PayloadMismatch {
        /// Wire name of the event.
        event: &'static str,
        /// Expected payload shape.
        expected: &'static str,
    },
}

impl TableError {
    /// Wraps a plugin error with the plugin's name.
    pub fn configure(plugin: impl Into<String>, source: PluginError) -> Self {
        Self::Configure {
            plugin: plugin.into(),
            source,
        }
    }
}

/// Error returned by a plugin hook that can fail.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct PluginError {
    /// Error message
    pub message: String,
}

impl PluginError {
    /// Create a new plugin error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for PluginError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for PluginError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}
