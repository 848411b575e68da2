/*!
Argument handling for the reconstruction pipeline.
*/

use std::convert::TryFrom;

use hashbrown::HashMap;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::numeric::decode_long;
use crate::repair::{DEFAULT_BUFFER_SIZE, DEFAULT_PEEK_LIMIT};

/// Default number of pointer slots scanned by the process environment heuristic.
pub const DEFAULT_ENVIRONMENT_SLOTS: usize = 64;

/// Argument wrapper for reconstruction options
///
/// # Examples
///
/// Construct from a string:
/// ```
/// use dumpflow::args::Args;
///
/// let argstr = "peek_limit=512,buffer_size=0x4000";
/// let args = Args::parse(argstr).unwrap();
/// assert_eq!(args.get("buffer_size").unwrap(), "0x4000");
/// ```
///
/// Construct as builder:
/// ```
/// use dumpflow::args::Args;
///
/// let args = Args::new()
///     .insert("peek_limit", "512")
///     .insert("environment_slots", "16");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Args {
    map: HashMap<String, String>,
}

impl Args {
    /// Creates an empty `Args` struct.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an `Args` struct with a default (unnamed) value.
    pub fn with_default(value: &str) -> Self {
        Self::new().insert("default", value)
    }

    /// Tries to create an `Args` structure from an argument string.
    ///
    /// The argument string is a string of comma separated key-value pairs:
    /// `opt1=val1,opt2=val2,opt3=val3`
    ///
    /// The first entry may also be a bare value which is stored as the default argument:
    /// `default_value,opt1=val1,opt2=val2`
    pub fn parse(args: &str) -> Result<Self> {
        let mut map = HashMap::new();

        for (i, kv) in args.split(',').enumerate() {
            let kv = kv.trim();
            match kv.split_once('=') {
                Some((key, value)) if !key.is_empty() && !value.contains('=') => {
                    map.insert(key.to_string(), value.to_string());
                }
                Some(_) => {
                    return Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
                        .log_debug(format!("malformed argument `{}`", kv)))
                }
                None if i == 0 && !kv.is_empty() => {
                    map.insert("default".to_string(), kv.to_string());
                }
                None => {}
            }
        }

        Ok(Self { map })
    }

    /// Consumes self, inserts the given key-value pair and returns the self again.
    pub fn insert(mut self, key: &str, value: &str) -> Self {
        self.map.insert(key.to_string(), value.to_string());
        self
    }

    /// Tries to retrieve an entry from the options map.
    pub fn get(&self, key: &str) -> Option<&String> {
        self.map.get(key)
    }

    /// Tries to retrieve the default entry from the options map.
    ///
    /// This function is a convenience wrapper for `args.get("default")`.
    pub fn get_default(&self) -> Option<&String> {
        self.get("default")
    }

    /// Retrieves a strictly positive size, accepting decimal or `0x` prefixed values.
    pub fn get_size(&self, key: &str) -> Result<Option<usize>> {
        let value = match self.get(key) {
            Some(value) => value,
            None => return Ok(None),
        };

        let num = decode_long(Some(value), 0).map_err(|_| {
            Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
                .log_error(format!("`{}={}` is not a number", key, value))
        })?;

        match usize::try_from(num) {
            Ok(num) if num > 0 => Ok(Some(num)),
            _ => Err(Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
                .log_error(format!("`{}={}` must be greater than zero", key, value))),
        }
    }
}

impl TryFrom<&str> for Args {
    type Error = Error;

    fn try_from(args: &str) -> Result<Self> {
        Args::parse(args)
    }
}

/// Tunables of a single reconstruction run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct ReconstructOptions {
    /// Upper bound for every tag name lookahead of the repair stream.
    pub peek_limit: usize,
    /// Initial capacity of the repair stream read buffer.
    pub buffer_size: usize,
    /// Number of pointer slots scanned when matching a process to the environment address.
    pub environment_slots: usize,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            peek_limit: DEFAULT_PEEK_LIMIT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            environment_slots: DEFAULT_ENVIRONMENT_SLOTS,
        }
    }
}

impl ReconstructOptions {
    /// Builds options from `peek_limit`, `buffer_size` and `environment_slots` arguments.
    ///
    /// Missing keys keep their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use dumpflow::args::{Args, ReconstructOptions};
    ///
    /// let args = Args::parse("peek_limit=64,environment_slots=0x10").unwrap();
    /// let options = ReconstructOptions::from_args(&args).unwrap();
    /// assert_eq!(options.peek_limit, 64);
    /// assert_eq!(options.environment_slots, 16);
    /// ```
    pub fn from_args(args: &Args) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            peek_limit: args.get_size("peek_limit")?.unwrap_or(defaults.peek_limit),
            buffer_size: args.get_size("buffer_size")?.unwrap_or(defaults.buffer_size),
            environment_slots: args
                .get_size("environment_slots")?
                .unwrap_or(defaults.environment_slots),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn from_str() {
        let argstr = "opt1=test1,opt2=test2,opt3=test3";
        let args = Args::parse(argstr).unwrap();
        assert_eq!(args.get("opt1").unwrap(), "test1");
        assert_eq!(args.get("opt2").unwrap(), "test2");
        assert_eq!(args.get("opt3").unwrap(), "test3");
    }

    #[test]
    pub fn from_str_default() {
        let args = Args::try_from("core.idx,peek_limit=32").unwrap();
        assert_eq!(args.get_default().unwrap(), "core.idx");
        assert_eq!(args.get("peek_limit").unwrap(), "32");

        let args = Args::parse("peek_limit=32,core.idx").unwrap();
        assert_eq!(args.get_default(), None);
    }

    #[test]
    pub fn parse_empty() {
        let args = Args::parse("").unwrap();
        assert_eq!(args.get_default(), None);
        assert_eq!(
            ReconstructOptions::from_args(&args).unwrap(),
            ReconstructOptions::default()
        );
    }

    #[test]
    pub fn malformed_pair() {
        assert_eq!(
            Args::parse("a=b=c").unwrap_err(),
            Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
        );
        assert!(Args::parse("=value").is_err());
    }

    #[test]
    pub fn options_from_args() {
        let args = Args::new()
            .insert("peek_limit", "0x40")
            .insert("buffer_size", "1024");
        let options = ReconstructOptions::from_args(&args).unwrap();
        assert_eq!(options.peek_limit, 64);
        assert_eq!(options.buffer_size, 1024);
        assert_eq!(options.environment_slots, DEFAULT_ENVIRONMENT_SLOTS);
    }

    #[test]
    pub fn options_reject_invalid_sizes() {
        for value in ["0", "-4", "many", "0x"] {
            let args = Args::new().insert("buffer_size", value);
            assert_eq!(
                ReconstructOptions::from_args(&args).unwrap_err(),
                Error(ErrorOrigin::Args, ErrorKind::ArgValidation)
            );
        }
    }
}
