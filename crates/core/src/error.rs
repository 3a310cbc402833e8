//! Error types for the install-handoff core.

use thiserror::Error;

/// Result type alias for handoff operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside of link building.
#[derive(Debug, Error)]
pub enum Error {
    /// Link building rejected the descriptor.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The navigation attempt itself failed (e.g. disallowed in a
    /// sandboxed context). Callers inside the detection race never see
    /// this - the detector converts it into a failed detection.
    #[error("Navigation failed: {0}")]
    Navigation(String),
}

/// Why a descriptor could not be turned into an install link.
///
/// Two classes share this enum: descriptor-shape problems (missing
/// template/transport/command/url) and security rejections (everything
/// else). Both surface to the user as "cannot install this integration";
/// [`is_security_rejection`](Self::is_security_rejection) separates them
/// for catalog-quality telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Descriptor carries no connection template at all.
    #[error("Descriptor has no connection template")]
    MissingTemplate,

    /// No transport tag and nothing to infer one from.
    #[error("Cannot determine transport for '{name}'")]
    MissingTransport {
        /// Display name of the offending descriptor
        name: String,
    },

    /// stdio template without a command.
    #[error("stdio template has no command")]
    MissingCommand,

    /// Command name matched the execution denylist.
    #[error("Command '{command}' is not allowed in install links")]
    BlockedCommand {
        /// The command as it appeared in the template
        command: String,
    },

    /// An argument matched a shell-syntax or destructive pattern.
    #[error("Argument '{argument}' matches dangerous pattern '{pattern}'")]
    DangerousArgument {
        /// The pattern that matched
        pattern: String,
        /// The offending argument
        argument: String,
    },

    /// An argument is a flag that implies inline code execution.
    #[error("Flag '{flag}' allows inline code execution")]
    BlockedFlag {
        /// The offending flag
        flag: String,
    },

    /// Network template without a URL.
    #[error("{transport} template has no url")]
    MissingUrl {
        /// The network sub-kind that was selected
        transport: String,
    },

    /// A header value carried script content.
    #[error("Header '{name}' contains unsafe content")]
    UnsafeHeader {
        /// Name of the offending header
        name: String,
    },

    /// Headers could not be serialized for the query string.
    #[error("Failed to encode headers: {0}")]
    HeaderEncoding(String),

    /// Assembled link exceeds what protocol handlers reliably accept.
    #[error("Install link is {length} bytes, over the {max} byte limit")]
    UriTooLong {
        /// Length of the assembled link
        length: usize,
        /// Enforced maximum
        max: usize,
    },

    /// Assembled link does not start with the required scheme and path.
    #[error("Install link does not start with '{expected}'")]
    InvalidScheme {
        /// The required prefix
        expected: &'static str,
    },
}

impl BuildError {
    /// True for rejections of hostile-looking descriptor content, as
    /// opposed to descriptors that are merely incomplete.
    ///
    /// Telemetry uses this split to monitor catalog quality: a spike in
    /// security rejections means the catalog is serving bad entries, not
    /// that users are clicking broken cards.
    pub fn is_security_rejection(&self) -> bool {
        match self {
            BuildError::MissingTemplate
            | BuildError::MissingTransport { .. }
            | BuildError::MissingCommand
            | BuildError::MissingUrl { .. } => false,
            BuildError::BlockedCommand { .. }
            | BuildError::DangerousArgument { .. }
            | BuildError::BlockedFlag { .. }
            | BuildError::UnsafeHeader { .. }
            | BuildError::HeaderEncoding(_)
            | BuildError::UriTooLong { .. }
            | BuildError::InvalidScheme { .. } => true,
        }
    }
}
