//! Pipeline error taxonomy.
//!
//! Adapters, the session, and the runner all return [`PipelineError`]. The
//! runner wraps the first failure of a run in [`PipelineExecutionError`],
//! which also records how far the run got.

use std::fmt;

use ducktail_types::{ConfigError, PipelineName, WriteMode};

use crate::execution::{RunState, Stage};

// ---------------------------------------------------------------------------
// Engine-level failures
// ---------------------------------------------------------------------------

/// A statement or session operation failed inside the engine.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct SessionError {
    message: String,
    #[source]
    source: Option<duckdb::Error>,
}

impl SessionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<duckdb::Error> for SessionError {
    fn from(err: duckdb::Error) -> Self {
        Self {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Attach classification
// ---------------------------------------------------------------------------

/// Best-effort category of an attach failure.
///
/// Classification matches substrings of the driver's message and is not
/// exhaustive; anything unrecognised is [`AttachErrorKind::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachErrorKind {
    Authentication,
    NetworkUnreachable,
    ExtensionUnavailable,
    Unknown,
}

const AUTH_PATTERNS: &[&str] = &[
    "password authentication failed",
    "authentication failed",
    "incorrect username or password",
    "invalid username",
    "invalid password",
    "access denied",
    "permission denied",
    "no password supplied",
];

const NETWORK_PATTERNS: &[&str] = &[
    "could not connect",
    "connection refused",
    "could not translate host name",
    "name or service not known",
    "no route to host",
    "network is unreachable",
    "timed out",
    "timeout expired",
    "connection reset",
];

const EXTENSION_PATTERNS: &[&str] = &[
    "extension",
    "unrecognized storage type",
    "unknown storage type",
    "not installed",
    "not loaded",
];

impl AttachErrorKind {
    /// Classify a driver message.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        if has(AUTH_PATTERNS) {
            Self::Authentication
        } else if has(NETWORK_PATTERNS) {
            Self::NetworkUnreachable
        } else if has(EXTENSION_PATTERNS) {
            Self::ExtensionUnavailable
        } else {
            Self::Unknown
        }
    }

    /// Operator-facing remediation.
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Authentication => {
                "check the user name, password, or key pair in the connection string"
            }
            Self::NetworkUnreachable => {
                "check host, port, firewall rules, and that the database is running"
            }
            Self::ExtensionUnavailable => {
                "make sure the backend's extension is listed in engine.required_extensions or optional_extensions and can be installed"
            }
            Self::Unknown => "inspect the underlying error message",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::NetworkUnreachable => "network_unreachable",
            Self::ExtensionUnavailable => "extension_unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AttachErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registering an external database in the session failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to attach '{attachment}' [{kind}]: {message} (hint: {})", .kind.hint())]
pub struct AttachError {
    pub kind: AttachErrorKind,
    pub attachment: String,
    /// Driver message with the connection string redacted.
    pub message: String,
}

impl AttachError {
    /// Classify `err` and scrub `connection` out of its message.
    #[must_use]
    pub fn from_session(attachment: &str, connection: &str, err: &SessionError) -> Self {
        let mut message = err.message().to_string();
        if !connection.is_empty() {
            message = message.replace(connection, "<connection>");
        }
        Self {
            kind: AttachErrorKind::classify(&message),
            attachment: attachment.to_string(),
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Any failure a pipeline run can hit.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid specification; raised before the engine is used.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session could not be opened or a required extension is missing.
    #[error("engine initialization failed: {message}")]
    EngineInit {
        message: String,
        #[source]
        source: Option<SessionError>,
    },

    #[error(transparent)]
    Attach(#[from] AttachError),

    /// Append/upsert into a table that does not exist.
    #[error(
        "target table '{table}' does not exist and mode '{mode}' needs an existing table; \
         bootstrap it with mode 'overwrite' first"
    )]
    TargetMissing { table: String, mode: WriteMode },

    /// Source has columns the target lacks and policy forbids reconciling.
    #[error("schema mismatch on '{table}': target is missing columns [{}]; {hint}", .missing.join(", "))]
    SchemaMismatch {
        table: String,
        missing: Vec<String>,
        hint: String,
    },

    /// The source relation's columns could not be probed.
    #[error("could not describe source relation for '{table}': {source}")]
    SchemaProbe {
        table: String,
        #[source]
        source: SessionError,
    },

    /// An ADD COLUMN statement failed.
    #[error("schema evolution failed adding column '{column}' to '{table}': {source}")]
    SchemaEvolutionFailed {
        table: String,
        column: String,
        #[source]
        source: SessionError,
    },

    /// A count, sample, or summary stage failed.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: SessionError,
    },

    /// The write failed; the transaction was rolled back.
    #[error("write failed and was rolled back: {source}")]
    Write {
        #[source]
        source: SessionError,
    },
}

impl PipelineError {
    pub(crate) fn engine_init(message: impl Into<String>, source: Option<SessionError>) -> Self {
        Self::EngineInit {
            message: message.into(),
            source,
        }
    }

    /// Configuration errors are never worth retrying.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// The single error type a run surfaces to its caller.
#[derive(Debug, thiserror::Error)]
#[error("pipeline '{pipeline}' failed after reaching '{state}': {source}")]
pub struct PipelineExecutionError {
    pub pipeline: PipelineName,
    /// Last lifecycle state reached before the failure.
    pub state: RunState,
    #[source]
    pub source: PipelineError,
}

impl PipelineExecutionError {
    #[must_use]
    pub fn cause(&self) -> &PipelineError {
        &self.source
    }
}
