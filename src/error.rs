use std::fmt;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    /// A validator library rejected a source schema while compiling or emitting it
    SchemaCompile { validator: String, message: String },
    /// A node type the validator library cannot handle (e.g. a file upload field)
    UnsupportedNode(String),
    InvalidArgument(String),
    SerializationError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::SchemaCompile { validator, message } => {
                write!(f, "{} schema compilation failed: {}", validator, message)
            }
            Error::UnsupportedNode(node) => write!(f, "unsupported schema node: {}", node),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML error: {}", err))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::InvalidArgument(format!("invalid pattern: {}", err))
    }
}
