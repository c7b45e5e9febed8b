use snafu::{prelude::*, Backtrace};

pub type Result<T> = std::result::Result<T, GeoError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GeoError {
    #[snafu(display("Could not parse geometry text: {description}"))]
    Parse {
        description: String,
        backtrace: Backtrace,
    },
    #[snafu(display("Malformed WKB: {description}"))]
    Wkb {
        description: String,
        backtrace: Backtrace,
    },
    #[snafu(display("Error reading bytes: {source}"))]
    Io {
        source: std::io::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Operation on mixed dimensionality: {left} vs {right}"))]
    DimensionMismatch {
        left: usize,
        right: usize,
        backtrace: Backtrace,
    },
    #[snafu(display("Operation on two geometries with different SRIDs ({left} vs {right})"))]
    SridMismatch {
        left: i32,
        right: i32,
        backtrace: Backtrace,
    },
    #[snafu(display("Degenerate geometry: {description}"))]
    DegenerateGeometry {
        description: String,
        backtrace: Backtrace,
    },
    #[snafu(display("Invalid argument: {description}"))]
    InvalidArgument {
        description: String,
        backtrace: Backtrace,
    },
    #[snafu(display("Could not extract a bounding box: {description}"))]
    BoxUnavailable {
        description: String,
        backtrace: Backtrace,
    },
    #[snafu(display("{source}\nContext: {context}"))]
    WithExtraContext {
        #[snafu(backtrace)]
        source: Box<GeoError>,
        context: String,
    },
    #[snafu(whatever, display("{message}"))]
    Other {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        backtrace: Backtrace,
    },
}

impl GeoError {
    /// Wrap this error with a description of what was being done when it occurred.
    pub fn with_extra_context(self, context: impl Into<String>) -> Self {
        GeoError::WithExtraContext {
            source: Box::new(self),
            context: context.into(),
        }
    }

    /// `true` for failures caused by malformed input, as opposed to
    /// failures of an operation on otherwise valid values.
    pub fn is_decode_error(&self) -> bool {
        match self {
            GeoError::Parse { .. } | GeoError::Wkb { .. } | GeoError::Io { .. } => true,
            GeoError::WithExtraContext { source, .. } => source.is_decode_error(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for GeoError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            GeoError::Wkb {
                description: "insufficient bytes in stream".to_string(),
                backtrace: Backtrace::capture(),
            }
        } else {
            GeoError::Io {
                source: e,
                backtrace: Backtrace::capture(),
            }
        }
    }
}

/// Fails with [`GeoError::SridMismatch`] unless both identifiers agree.
pub fn check_srid(left: i32, right: i32) -> Result<()> {
    ensure!(left == right, SridMismatchSnafu { left, right });
    Ok(())
}
