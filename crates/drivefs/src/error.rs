use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by drivefs operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Directory exists: {0}")]
    DirectoryExists(String),

    #[error("File exists: {0}")]
    FileExists(String),

    #[error("Destination exists: {0}")]
    DestinationExists(String),

    #[error("Expected a file: {0}")]
    FileExpected(String),

    #[error("Expected a directory: {0}")]
    DirectoryExpected(String),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Invalid characters in path: {0}")]
    InvalidCharsInPath(String),

    #[error("Cannot remove the root directory: {0}")]
    RemoveRoot(String),

    /// The backend holds more than one live child with the same name.
    #[error("Folder with id {parent_id} has more than 1 child with name {name}")]
    Consistency { parent_id: String, name: String },

    #[error("Operation failed on {path}: {msg}")]
    OperationFailed { path: String, msg: String },

    #[error("No URL for {path}: {msg}")]
    NoUrl { path: String, msg: String },

    #[error("Unknown sharing role: {0}")]
    UnsupportedRole(String),

    #[error("Invalid open mode: {0}")]
    InvalidMode(String),

    /// Non-success response from the backend API.
    #[error("Backend error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn not_found<P: AsRef<str>>(path: P) -> Self {
        Error::NotFound(path.as_ref().to_string())
    }

    pub fn directory_exists<P: AsRef<str>>(path: P) -> Self {
        Error::DirectoryExists(path.as_ref().to_string())
    }

    pub fn file_exists<P: AsRef<str>>(path: P) -> Self {
        Error::FileExists(path.as_ref().to_string())
    }

    pub fn destination_exists<P: AsRef<str>>(path: P) -> Self {
        Error::DestinationExists(path.as_ref().to_string())
    }

    pub fn file_expected<P: AsRef<str>>(path: P) -> Self {
        Error::FileExpected(path.as_ref().to_string())
    }

    pub fn directory_expected<P: AsRef<str>>(path: P) -> Self {
        Error::DirectoryExpected(path.as_ref().to_string())
    }

    pub fn directory_not_empty<P: AsRef<str>>(path: P) -> Self {
        Error::DirectoryNotEmpty(path.as_ref().to_string())
    }

    pub fn invalid_chars<P: AsRef<str>>(path: P) -> Self {
        Error::InvalidCharsInPath(path.as_ref().to_string())
    }

    pub fn remove_root<P: AsRef<str>>(path: P) -> Self {
        Error::RemoveRoot(path.as_ref().to_string())
    }

    pub fn consistency<S: AsRef<str>, N: AsRef<str>>(parent_id: S, name: N) -> Self {
        Error::Consistency {
            parent_id: parent_id.as_ref().to_string(),
            name: name.as_ref().to_string(),
        }
    }

    pub fn operation_failed<P: AsRef<str>, M: std::fmt::Display>(path: P, msg: M) -> Self {
        Error::OperationFailed {
            path: path.as_ref().to_string(),
            msg: msg.to_string(),
        }
    }

    pub fn no_url<P: AsRef<str>, M: std::fmt::Display>(path: P, msg: M) -> Self {
        Error::NoUrl {
            path: path.as_ref().to_string(),
            msg: msg.to_string(),
        }
    }

    pub fn api<M: Into<String>>(status: u16, message: M) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    pub fn config<M: Into<String>>(message: M) -> Self {
        Error::Config(message.into())
    }

    /// True for errors a retry can plausibly fix: transport failures,
    /// rate limiting and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// True when the backend rejected the request as unauthenticated.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Api { status: 401, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::api(503, "backend unavailable").is_transient());
        assert!(Error::api(429, "rate limited").is_transient());
        assert!(!Error::api(404, "file not found").is_transient());
        assert!(!Error::not_found("/a").is_transient());
        assert!(Error::api(401, "expired").is_unauthorized());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::consistency("abc", "dup").to_string(),
            "Folder with id abc has more than 1 child with name dup"
        );
        assert_eq!(Error::not_found("/x/y").to_string(), "Path not found: /x/y");
    }
}
