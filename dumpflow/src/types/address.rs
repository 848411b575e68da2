/*!
Abstraction over an address inside the dumped process.

Every runtime id in an index file (class, class loader, thread, monitor, heap object)
is an address in the dumped process, so all of them are represented by this type.
*/

use std::fmt;
use std::ops;

/// This type represents an address in the dumped process.
///
/// Ids are only unique within their own namespace (two classes can never share an id,
/// but a class and its backing heap object are different entities even if the index
/// uses related values for both).
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Address(u64);

impl Address {
    /// An address with the value of zero.
    ///
    /// The index uses zero as the "unset" sentinel for optional references.
    ///
    /// # Examples
    ///
    /// ```
    /// use dumpflow::types::Address;
    ///
    /// assert!(Address::NULL.is_null());
    /// ```
    pub const NULL: Address = Address(0);

    #[inline]
    pub const fn null() -> Self {
        Address::NULL
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Converts the address into an `Option`, mapping the null sentinel to `None`.
    #[inline]
    pub fn non_null(self) -> Option<Address> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    #[inline]
    pub const fn to_umem(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns true if the address is a multiple of `alignment`.
    ///
    /// An alignment of zero or one accepts every address.
    pub const fn is_aligned(self, alignment: u64) -> bool {
        alignment <= 1 || self.0 % alignment == 0
    }

    pub const fn wrapping_add(self, other: u64) -> Self {
        Self(self.0.wrapping_add(other))
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::null()
    }
}

macro_rules! impl_address_from {
    ($type_name:ident) => {
        impl From<$type_name> for Address {
            #[inline(always)]
            fn from(item: $type_name) -> Self {
                Self(item as u64)
            }
        }
    };
}

impl_address_from!(u8);
impl_address_from!(u16);
impl_address_from!(u32);
impl_address_from!(u64);
impl_address_from!(usize);
impl_address_from!(i32);
// negative values keep their two's complement bit pattern,
// the numeric decoder produces i64 for 64-bit pointers above i64::MAX.
impl_address_from!(i64);

impl From<Address> for u64 {
    fn from(address: Address) -> u64 {
        address.0
    }
}

macro_rules! impl_address_arithmetic_unsigned {
    ($type_name:ident) => {
        impl ops::Add<$type_name> for Address {
            type Output = Self;

            fn add(self, other: $type_name) -> Self {
                Self(self.0 + (other as u64))
            }
        }

        impl ops::AddAssign<$type_name> for Address {
            fn add_assign(&mut self, other: $type_name) {
                self.0 += other as u64;
            }
        }

        impl ops::Sub<$type_name> for Address {
            type Output = Address;

            fn sub(self, other: $type_name) -> Address {
                Self(self.0 - (other as u64))
            }
        }
    };
}

impl_address_arithmetic_unsigned!(u32);
impl_address_arithmetic_unsigned!(u64);
impl_address_arithmetic_unsigned!(usize);

impl ops::Sub for Address {
    type Output = u64;

    /// Returns the distance between two addresses, saturating at zero.
    fn sub(self, other: Self) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}
impl fmt::UpperHex for Address {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}
impl fmt::LowerHex for Address {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null() {
        assert!(Address::null().is_null());
        assert_eq!(Address::from(0x10_u64).non_null(), Some(Address::from(0x10_u64)));
        assert_eq!(Address::NULL.non_null(), None);
    }

    #[test]
    fn test_from() {
        assert_eq!(Address::from(1337_u32).to_umem(), 1337);
        assert_eq!(Address::from(4321_u64).to_umem(), 4321);
        assert_eq!(Address::from(-1_i64).to_umem(), u64::MAX);
    }

    #[test]
    fn test_alignment() {
        assert!(Address::from(0x1008_u64).is_aligned(8));
        assert!(!Address::from(0x1004_u64).is_aligned(8));
        assert!(Address::from(0x1003_u64).is_aligned(0));
    }

    #[test]
    fn test_ops() {
        assert_eq!(Address::from(10_u64) + 5usize, Address::from(15_u64));
        assert_eq!(Address::from(10_u64) - Address::from(5_u64), 5);
        assert_eq!(Address::from(5_u64) - Address::from(10_u64), 0);
        assert_eq!(Address::from(100_u64) - 5u64, Address::from(95_u64));
    }

    #[test]
    fn test_fmt() {
        assert_eq!(format!("{}", Address::from(0x13e5e4_u64)), "0x13e5e4");
        assert_eq!(format!("{:x}", Address::from(0xabc_u64)), "abc");
    }
}
