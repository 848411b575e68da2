use smallvec::SmallVec;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::numeric::decode_long;
use crate::types::Address;

/// Attributes of a single element together with the element name for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Attributes<'a> {
    element: &'a str,
    attrs: SmallVec<[(&'a str, &'a str); 12]>,
}

impl<'a> Attributes<'a> {
    pub fn new<I: IntoIterator<Item = (&'a str, &'a str)>>(element: &'a str, attrs: I) -> Self {
        Self {
            element,
            attrs: attrs.into_iter().collect(),
        }
    }

    pub fn element(&self) -> &'a str {
        self.element
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, value)| value)
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_string)
    }

    pub fn required(&self, name: &str) -> Result<&'a str> {
        self.get(name).ok_or_else(|| {
            Error(ErrorOrigin::Node, ErrorKind::RequiredAttributeNotFound)
                .log_debug(format!("`{}` on `{}`", name, self.element))
        })
    }

    /// Decodes a numeric attribute, `default` if it is absent.
    pub fn long(&self, name: &str, default: i64) -> Result<i64> {
        decode_long(self.get(name), default).map_err(|err| {
            err.log_debug(format!("`{}` on `{}`", name, self.element))
        })
    }

    /// Decodes an optional numeric attribute, `None` if it is absent.
    pub fn optional_long(&self, name: &str) -> Result<Option<i64>> {
        self.get(name)
            .map(|value| self.long_value(name, value))
            .transpose()
    }

    pub fn required_long(&self, name: &str) -> Result<i64> {
        let value = self.required(name)?;
        self.long_value(name, value)
    }

    /// Decodes an id or pointer attribute, null if it is absent.
    pub fn address(&self, name: &str) -> Result<Address> {
        self.long(name, 0).map(Address::from)
    }

    pub fn required_address(&self, name: &str) -> Result<Address> {
        self.required_long(name).map(Address::from)
    }

    pub fn u64(&self, name: &str) -> Result<u64> {
        self.long(name, 0).map(|v| v as u64)
    }

    pub fn u32(&self, name: &str) -> Result<u32> {
        self.long(name, 0).map(|v| v as u32)
    }

    fn long_value(&self, name: &str, value: &str) -> Result<i64> {
        decode_long(Some(value), 0).map_err(|err| {
            err.log_debug(format!("`{}` on `{}`", name, self.element))
        })
    }
}
