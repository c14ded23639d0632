//! Errors and error-related utilities.
//!
//! Each error kind is a small struct so that callers who care can tell them
//! apart with [`downcast_ref`](std::error::Error).

use std::{error, fmt, result};

/// The result type used throughout this library.
pub type Result<T> = result::Result<T, Box<dyn error::Error>>;

/// The tabular source could not be opened or read.
#[derive(Debug)]
pub struct SourceUnavailable(pub String);

/// A document could not be written to its destination.
#[derive(Debug)]
pub struct RenderFailure(pub String);

/// A field schema or configuration file violates its invariants.
#[derive(Debug)]
pub struct InvalidSchema(pub String);

/// Invalid command line argument.
#[derive(Debug)]
pub struct InvalidArgument(pub String);

impl fmt::Display for SourceUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "source unavailable: {}", self.0)
    }
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "render failure: {}", self.0)
    }
}

impl fmt::Display for InvalidSchema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid schema: {}", self.0)
    }
}

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid argument: {}", self.0)
    }
}

impl error::Error for SourceUnavailable {}

impl error::Error for RenderFailure {}

impl error::Error for InvalidSchema {}

impl error::Error for InvalidArgument {}

/// A helper for constructing [SourceUnavailable].
pub fn source_unavailable(s: String) -> Box<dyn error::Error> {
    SourceUnavailable(s).into()
}

/// A helper for constructing [RenderFailure].
pub fn render_failure(s: String) -> Box<dyn error::Error> {
    RenderFailure(s).into()
}

/// A helper for constructing [RenderFailure].
pub fn render_failure_ref(s: &str) -> Box<dyn error::Error> {
    RenderFailure(s.to_owned()).into()
}

/// A helper for constructing [InvalidSchema].
pub fn invalid_schema(s: String) -> Box<dyn error::Error> {
    InvalidSchema(s).into()
}

/// A helper for constructing [InvalidSchema].
pub fn invalid_schema_ref(s: &str) -> Box<dyn error::Error> {
    InvalidSchema(s.to_owned()).into()
}

/// A helper for constructing [InvalidArgument].
pub fn invalid_argument(s: String) -> Box<dyn error::Error> {
    InvalidArgument(s).into()
}

/// A helper for constructing [InvalidArgument].
pub fn invalid_argument_ref(s: &str) -> Box<dyn error::Error> {
    InvalidArgument(s.to_owned()).into()
}

/// Is this error a [SourceUnavailable]?
pub fn is_source_unavailable(e: &(dyn error::Error + 'static)) -> bool {
    e.downcast_ref::<SourceUnavailable>().is_some()
}

/// Is this error a [RenderFailure]?
pub fn is_render_failure(e: &(dyn error::Error + 'static)) -> bool {
    e.downcast_ref::<RenderFailure>().is_some()
}
