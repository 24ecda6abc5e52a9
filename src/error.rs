use std::fmt;

pub type Result<T> = std::result::Result<T, BuildError>;

/// Express which stage of the build a problem belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLayer {
    /// The lineage rows themselves could not be read or parsed.  Rows that
    /// merely lack values are never errors; they truncate silently during
    /// compilation.
    BadInput,
    /// The hierarchy schema or build configuration is internally
    /// inconsistent, like a relationship naming a level that doesn't exist.
    Schema,
    /// Template construction or rendering failed.
    Rendering,
    /// The document could not be written to its destination.
    Output,
}

/// Payload describing what went wrong for investigation purposes.
#[derive(Debug)]
pub struct ErrorDetails {
    pub layer: ErrorLayer,
    /// Stringified version of the lower level error.
    pub message: String,
}

#[derive(Debug)]
pub enum BuildError {
    Problem(ErrorDetails),
    Io(std::io::Error),
}

impl BuildError {
    pub fn new(layer: ErrorLayer, message: impl Into<String>) -> Self {
        BuildError::Problem(ErrorDetails {
            layer,
            message: message.into(),
        })
    }

    pub fn layer(&self) -> ErrorLayer {
        match self {
            BuildError::Problem(details) => details.layer,
            BuildError::Io(_) => ErrorLayer::Output,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Problem(details) => {
                write!(f, "{:?} problem: {}", details.layer, details.message)
            }
            BuildError::Io(err) => write!(f, "I/O problem: {}", err),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Io(err) => Some(err),
            BuildError::Problem(_) => None,
        }
    }
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> BuildError {
        BuildError::Io(err)
    }
}

// JSON and CSV parse errors are input problems.
impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> BuildError {
        BuildError::new(ErrorLayer::BadInput, err.to_string())
    }
}

impl From<csv::Error> for BuildError {
    fn from(err: csv::Error) -> BuildError {
        BuildError::new(ErrorLayer::BadInput, err.to_string())
    }
}

impl From<toml::de::Error> for BuildError {
    fn from(err: toml::de::Error) -> BuildError {
        BuildError::new(ErrorLayer::Schema, err.to_string())
    }
}

impl From<liquid::Error> for BuildError {
    fn from(err: liquid::Error) -> BuildError {
        BuildError::new(ErrorLayer::Rendering, err.to_string())
    }
}
