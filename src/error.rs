use thiserror::Error;

/// Result alias used across the adapter.
pub type Result<T, E = SlideError> = std::result::Result<T, E>;

/// Errors that can occur while opening or reading a slide
#[derive(Debug, Error)]
pub enum SlideError {
    /// The vendor shared object could not be loaded
    #[error("Failed to load vendor library {path}: {message}")]
    LibraryLoad { path: String, message: String },

    /// A required vendor entry point is absent from the loaded library
    ///
    /// This is fatal: no handle is ever produced without the full symbol table.
    #[error("Required vendor symbol missing: {message}")]
    MissingSymbol { message: String },

    /// A path could not be handed to the vendor library (interior NUL byte)
    #[error("Invalid path {0:?}: contains an interior NUL byte")]
    InvalidPath(String),

    /// The vendor library refused to initialize a context for the file
    #[error("Vendor failed to open slide: {0}")]
    OpenFailed(String),

    /// The vendor library could not read the slide header
    #[error("Vendor failed to read slide header: {0}")]
    HeaderReadFailed(String),

    /// Requested level is outside `[0, level_count)`
    #[error("Level {level} out of range (slide has {count} levels)")]
    LevelOutOfRange { level: usize, count: usize },

    /// The tile read produced no bytes
    #[error("Region read at level {level} ({x}, {y}) returned {bytes} bytes")]
    RegionReadFailed {
        level: usize,
        x: i32,
        y: i32,
        bytes: i32,
    },

    /// The vendor reported failure for a region-of-interest read
    #[error("Region of interest read at level {level} ({x}, {y}, {width}x{height}) failed")]
    RoiReadFailed {
        level: usize,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
}

impl From<dlopen2::Error> for SlideError {
    fn from(err: dlopen2::Error) -> Self {
        match err {
            dlopen2::Error::SymbolGettingError(e) => SlideError::MissingSymbol {
                message: e.to_string(),
            },
            dlopen2::Error::NullSymbol => SlideError::MissingSymbol {
                message: "symbol resolved to a null address".to_string(),
            },
            other => SlideError::LibraryLoad {
                path: String::new(),
                message: other.to_string(),
            },
        }
    }
}
