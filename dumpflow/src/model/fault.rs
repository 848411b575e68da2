/*!
Fault records and signal normalization.

The failing-thread record carries free text of `key=value` pairs. The direct signal
number is used when it is set, otherwise the runtime's generic signal bitmask is
mapped onto a canonical signal number.
*/

use crate::error::Result;
use crate::numeric::decode_keyed_long;
use crate::types::Address;

/// Canonical signal numbers produced by [`normalize_generic_signal`].
pub mod signal {
    pub const SIGILL: i64 = 4;
    pub const SIGTRAP: i64 = 5;
    pub const SIGABRT: i64 = 6;
    pub const SIGBUS: i64 = 7;
    pub const SIGFPE: i64 = 8;
    pub const SIGSEGV: i64 = 11;
    pub const SIGTERM: i64 = 15;

    pub const FPE_DIV_BY_ZERO: i64 = 35;
    pub const FPE_INT_DIV_BY_ZERO: i64 = 36;
    pub const FPE_INT_OVERFLOW: i64 = 37;
}

/// Bits of the runtime's generic signal bitmask.
pub mod generic {
    pub const SEGV: i64 = 0x4;
    pub const BUS: i64 = 0x8;
    pub const ILL: i64 = 0x10;
    pub const FPE: i64 = 0x20;
    pub const TRAP: i64 = 0x40;
    pub const ABRT: i64 = 0x800;
    pub const TERM: i64 = 0x1000;

    pub const FPE_DIV_BY_ZERO: i64 = 0x40020;
    pub const FPE_INT_DIV_BY_ZERO: i64 = 0x80020;
    pub const FPE_INT_OVERFLOW: i64 = 0x100020;
}

/// Key of the direct signal number in the fault text.
pub const SIGNAL_NUMBER_KEY: &str = "Signal_Number";
/// Key of the generic signal bitmask in the fault text.
pub const GENERIC_SIGNAL_KEY: &str = "J9Generic_Signal_Number";

/// Maps a generic signal bitmask onto a canonical signal number.
///
/// The floating point refinements are checked before the plain floating point bit,
/// a bitmask matching none of the known bits is returned unchanged.
///
/// # Examples
///
/// ```
/// use dumpflow::model::fault::{generic, normalize_generic_signal, signal};
///
/// assert_eq!(normalize_generic_signal(generic::SEGV), signal::SIGSEGV);
/// assert_eq!(
///     normalize_generic_signal(generic::FPE_INT_DIV_BY_ZERO),
///     signal::FPE_INT_DIV_BY_ZERO
/// );
/// assert_eq!(normalize_generic_signal(0x2), 0x2);
/// ```
pub fn normalize_generic_signal(num: i64) -> i64 {
    let has = |flag: i64| (num & flag) == flag;

    if has(generic::ILL) {
        signal::SIGILL
    } else if has(generic::FPE_DIV_BY_ZERO) {
        signal::FPE_DIV_BY_ZERO
    } else if has(generic::FPE_INT_DIV_BY_ZERO) {
        signal::FPE_INT_DIV_BY_ZERO
    } else if has(generic::FPE_INT_OVERFLOW) {
        signal::FPE_INT_OVERFLOW
    } else if has(generic::FPE) {
        signal::SIGFPE
    } else if has(generic::BUS) {
        signal::SIGBUS
    } else if has(generic::SEGV) {
        signal::SIGSEGV
    } else if has(generic::ABRT) {
        signal::SIGABRT
    } else if has(generic::TRAP) {
        signal::SIGTRAP
    } else if has(generic::TERM) {
        signal::SIGTERM
    } else {
        num
    }
}

/// Extracts the signal number from fault record text.
pub fn decode_signal(text: &str) -> Result<i64> {
    let direct = decode_keyed_long(text, SIGNAL_NUMBER_KEY)?;
    if direct != 0 {
        return Ok(direct);
    }
    Ok(normalize_generic_signal(decode_keyed_long(
        text,
        GENERIC_SIGNAL_KEY,
    )?))
}

/// The failure that triggered the dump.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct FaultRecord {
    pub failing_thread: Address,
    pub native_failing_thread: Address,
    pub signal: i64,
    /// The raw register and signal dump.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refinements_take_priority_over_fpe() {
        assert_eq!(
            normalize_generic_signal(generic::FPE | 0x80000),
            signal::FPE_INT_DIV_BY_ZERO
        );
        assert_eq!(
            normalize_generic_signal(generic::FPE_DIV_BY_ZERO),
            signal::FPE_DIV_BY_ZERO
        );
        assert_eq!(
            normalize_generic_signal(generic::FPE_INT_OVERFLOW),
            signal::FPE_INT_OVERFLOW
        );
        assert_eq!(normalize_generic_signal(generic::FPE), signal::SIGFPE);
    }

    #[test]
    fn plain_bits() {
        assert_eq!(normalize_generic_signal(generic::ILL), signal::SIGILL);
        assert_eq!(normalize_generic_signal(generic::BUS), signal::SIGBUS);
        assert_eq!(normalize_generic_signal(generic::TRAP), signal::SIGTRAP);
        assert_eq!(normalize_generic_signal(generic::ABRT), signal::SIGABRT);
        assert_eq!(normalize_generic_signal(generic::TERM), signal::SIGTERM);
    }

    #[test]
    fn unmatched_passes_through() {
        assert_eq!(normalize_generic_signal(0), 0);
        assert_eq!(normalize_generic_signal(0x80000), 0x80000);
    }

    #[test]
    fn direct_number_wins() {
        let text = "J9Generic_Signal_Number=00000004 Signal_Number=0000000B";
        assert_eq!(decode_signal(text).unwrap(), 0xb);

        let text = "J9Generic_Signal_Number=00080020 Signal_Number=00000000";
        assert_eq!(decode_signal(text).unwrap(), signal::FPE_INT_DIV_BY_ZERO);

        let text = "J9Generic_Signal_Number=00000004";
        assert_eq!(decode_signal(text).unwrap(), signal::SIGSEGV);
    }

    #[test]
    fn malformed_value_is_an_error() {
        assert!(decode_signal("Signal_Number=xyz").is_err());
    }
}
