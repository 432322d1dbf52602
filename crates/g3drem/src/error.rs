use thiserror::Error;

/// Errors raised while building, writing or reading a g3drem header.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("no output sink provided")]
    MissingSink,

    /// A single write accepted fewer (or more) bytes than requested. The
    /// output is considered corrupt from this point on.
    #[error("short write in {section}: expected {expected} bytes, wrote {written}")]
    ShortWrite {
        section: &'static str,
        expected: usize,
        written: usize,
    },

    #[error("i/o error while writing header: {0}")]
    Io(#[from] std::io::Error),

    #[error("value {value} does not fit in header field `{field}`")]
    FieldOverflow { field: &'static str, value: i64 },

    #[error("file truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("bad magic {0:?}")]
    BadMagic([u8; 16]),

    #[error("inconsistent offsets: thumbnail {thumbnail}, image {image}, gcode {gcode}")]
    InconsistentOffsets { thumbnail: u32, image: u32, gcode: u32 },
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, HeaderError>;
