//! Error types for the daemon core.
//!
//! Two layers, matching `ember-proto`'s own split: [`HandlerError`] is a
//! typed, matchable enum for command-processing failures that the dispatcher
//! converts into a numeric reply and recovers from locally; [`StartupError`]
//! and [`ConfigError`] cover the boot path and become an opaque
//! [`anyhow::Error`] at `main`'s top level.

use ember_proto::Response;
use thiserror::Error;

/// Failures a command handler can report. The dispatcher uses these only to
/// pick a numeric reply and a log line; none of them tear down the session.
///
/// Most access denials carry target-specific parameters (channel name,
/// offending nick) and are built as numeric replies inside the handler;
/// only the failures with no extra context to carry travel this way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Command requires more parameters than were supplied.
    #[error("need more params")]
    NeedMoreParams,
    /// Requested nickname is already claimed.
    #[error("nick in use")]
    NickInUse,
    /// Requested nickname fails the C1 validity rule.
    #[error("erroneous nickname")]
    ErroneousNickname,
    /// An invariant that should be structurally impossible was violated.
    /// Logged at `error` and the command fails safely; never panics.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Map this failure to the numeric reply code a client should see.
    pub fn to_irc_reply(&self) -> Response {
        match self {
            HandlerError::NeedMoreParams => Response::ERR_NEEDMOREPARAMS,
            HandlerError::NickInUse => Response::ERR_NICKNAMEINUSE,
            HandlerError::ErroneousNickname => Response::ERR_ERRONEOUSNICKNAME,
            HandlerError::Internal(_) => Response::ERR_UNKNOWNERROR,
        }
    }

    /// A short label suitable for a `tracing` field or a metrics counter.
    pub fn error_code(&self) -> &'static str {
        match self {
            HandlerError::NeedMoreParams => "need_more_params",
            HandlerError::NickInUse => "nick_in_use",
            HandlerError::ErroneousNickname => "erroneous_nickname",
            HandlerError::Internal(_) => "internal",
        }
    }
}

/// Boot-time configuration problems. `validate` collects every one found
/// rather than stopping at the first, so an operator fixes a broken file
/// in one pass.
#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    /// A required `[section]` or field was absent.
    #[error("missing required field: {0}")]
    MissingField(String),
    /// A field was present but failed a range/format check.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: String,
        /// Human-readable reason the value was rejected.
        reason: String,
    },
    /// The TOML document itself failed to parse.
    #[error("TOML parse error: {0}")]
    Parse(String),
    /// The configured file could not be read.
    #[error("could not read config file: {0}")]
    Io(String),
}

/// Fatal errors that abort the boot sequence before the event loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigErrorList),
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that failed to bind.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Requested to run as root without `--runasroot`.
    #[error("refusing to run as root without --runasroot")]
    RefusedRoot,
}

/// Wrapper so `Vec<ConfigError>` can implement `std::error::Error` and plug
/// into `StartupError`'s `#[from]`.
#[derive(Debug)]
pub struct ConfigErrorList(pub Vec<ConfigError>);

impl std::fmt::Display for ConfigErrorList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrorList {}
