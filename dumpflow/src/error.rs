/*!
Specialized `Error` and `Result` types for dumpflow.
*/

use std::{error, fmt, result};

use log::{debug, error, info, trace, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct Error(pub ErrorOrigin, pub ErrorKind);

impl Error {
    /// Returns a static string representing the type of error.
    pub fn as_str(&self) -> &'static str {
        self.1.to_str()
    }

    /// Returns a static string representing the type of error.
    pub fn into_str(self) -> &'static str {
        self.as_str()
    }

    /// Returns the component this error was raised in.
    pub fn origin(&self) -> ErrorOrigin {
        self.0
    }

    /// Returns the kind of failure.
    pub fn kind(&self) -> ErrorKind {
        self.1
    }

    pub fn log_error(self, err: impl fmt::Display) -> Self {
        error!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_warn(self, err: impl fmt::Display) -> Self {
        warn!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_info(self, err: impl fmt::Display) -> Self {
        info!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_debug(self, err: impl fmt::Display) -> Self {
        debug!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }

    pub fn log_trace(self, err: impl fmt::Display) -> Self {
        trace!("{}: {} ({})", self.0.to_str(), self.1.to_str(), err);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.0.to_str(), self.1.to_str())
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        self.as_str()
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum ErrorOrigin {
    Args,

    Numeric,
    TagRepair,
    Tokenizer,
    Dispatch,
    Node,
    Resolution,

    AddressSpace,
    Image,

    Other,
}

impl ErrorOrigin {
    /// Returns a static string representing the type of error.
    pub fn to_str(self) -> &'static str {
        match self {
            ErrorOrigin::Args => "args",

            ErrorOrigin::Numeric => "numeric decoder",
            ErrorOrigin::TagRepair => "tag repair",
            ErrorOrigin::Tokenizer => "tokenizer",
            ErrorOrigin::Dispatch => "dispatch",
            ErrorOrigin::Node => "node",
            ErrorOrigin::Resolution => "resolution",

            ErrorOrigin::AddressSpace => "address space",
            ErrorOrigin::Image => "image",

            ErrorOrigin::Other => "other",
        }
    }
}

#[repr(u16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum ErrorKind {
    Configuration,
    ArgValidation,

    InvalidNumber,
    RequiredAttributeNotFound,
    HeapShapeConflict,
    MalformedDocument,
    Encoding,

    UnableToReadFile,
    UnableToMapFile,

    ProcessNotFound,
    RuntimeNotFound,
    NotFound,

    OutOfHeapRange,
    OutOfMemoryRange,
    MemoryMapOverlap,
    DataUnavailable,
    CorruptData,

    Unknown,
}

impl ErrorKind {
    /// Returns a static string representing the type of error.
    pub fn to_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::ArgValidation => "the argument could not be validated",

            ErrorKind::InvalidNumber => "invalid numeric value",
            ErrorKind::RequiredAttributeNotFound => "required attribute is not set",
            ErrorKind::HeapShapeConflict => "legacy and region heap layouts mixed in one heap",
            ErrorKind::MalformedDocument => "malformed index document",
            ErrorKind::Encoding => "encoding error",

            ErrorKind::UnableToReadFile => "unable to read file",
            ErrorKind::UnableToMapFile => "unable to map file",

            ErrorKind::ProcessNotFound => "process not found",
            ErrorKind::RuntimeNotFound => "runtime not found",
            ErrorKind::NotFound => "not found",

            ErrorKind::OutOfHeapRange => "address is outside of every heap region",
            ErrorKind::OutOfMemoryRange => "out of memory range",
            ErrorKind::MemoryMapOverlap => "memory map ranges overlap",
            ErrorKind::DataUnavailable => "data unavailable",
            ErrorKind::CorruptData => "corrupt data",

            ErrorKind::Unknown => "unknown error",
        }
    }
}

/// Specialized `Result` type for dumpflow results.
pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, ErrorOrigin};

    #[test]
    pub fn display() {
        let err = Error(ErrorOrigin::Node, ErrorKind::HeapShapeConflict);
        assert_eq!(
            err.to_string(),
            "node: legacy and region heap layouts mixed in one heap"
        );
    }

    #[test]
    pub fn distinct_structural_kinds() {
        let conflict = Error(ErrorOrigin::Node, ErrorKind::HeapShapeConflict);
        let missing = Error(ErrorOrigin::Node, ErrorKind::RequiredAttributeNotFound);
        assert_ne!(conflict, missing);
        assert_eq!(conflict.origin(), missing.origin());
    }

    #[test]
    pub fn log_helpers_return_self() {
        let err = Error(ErrorOrigin::Numeric, ErrorKind::InvalidNumber);
        assert_eq!(err.log_debug("0xzz"), err);
        assert_eq!(err.log_trace("0xzz").kind(), ErrorKind::InvalidNumber);
    }
}
