use thiserror::Error;

/// Errors reading or writing a structure through its layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("struct {layout} has no field `{field}`")]
    NoSuchField {
        layout: &'static str,
        field: String,
    },

    #[error("field `{field}` of struct {layout} is not {expected}")]
    WrongKind {
        layout: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    #[error("value {value} does not fit field `{field}`")]
    OutOfRange { field: &'static str, value: i128 },

    #[error("buffer of {actual} bytes is too small for struct {layout} ({required} bytes)")]
    BufferTooSmall {
        layout: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
