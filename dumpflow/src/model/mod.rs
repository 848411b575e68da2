/*!
Reconstructed runtime state.

Everything a parse produces is stored in arenas keyed by runtime id. Cross references
between entities are plain [`Address`] values which are looked up through the owning
[`JavaRuntime`]; back references from heap objects to the entities they back are
established once the whole index is known.
*/

pub mod class;
pub mod fault;
pub mod heap;
pub mod monitor;
pub mod object;
pub mod root;
pub mod runtime;
pub mod thread;

#[doc(hidden)]
pub use class::{ClassKind, JavaClass, JavaClassLoader, JavaField, JavaMethod, JavaStaticField};
#[doc(hidden)]
pub use fault::FaultRecord;
#[doc(hidden)]
pub use heap::{HeapRegion, HeapShape, JavaHeap};
#[doc(hidden)]
pub use monitor::JavaMonitor;
#[doc(hidden)]
pub use object::{AssociationFlags, JavaObject};
#[doc(hidden)]
pub use root::{GcRoot, Reachability, RootKind};
#[doc(hidden)]
pub use runtime::JavaRuntime;
#[doc(hidden)]
pub use thread::{JavaThread, StackFrame};

use chrono::{DateTime, Utc};

use crate::image::{Endianness, PlatformInfo};
use crate::types::Address;

/// Platform metadata of the dumped process.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct DumpHeader {
    pub endianness: Endianness,
    /// Pointer width in bits.
    pub pointer_bits: u32,
    pub version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub cpu_type: Option<String>,
    pub cpu_subtype: Option<String>,
    pub cpu_count: u32,
    pub memory_bytes: u64,
    /// Address of the process environment block.
    pub environment: Address,
    pub creation_time: Option<DateTime<Utc>>,
}

impl DumpHeader {
    /// Derives a header from the image alone, used when the index cannot be read.
    pub fn from_platform(platform: &PlatformInfo) -> Self {
        Self {
            endianness: platform.endianness,
            pointer_bits: platform.pointer_size as u32 * 8,
            version: None,
            os_name: Some(platform.os_type.clone()),
            os_version: platform.os_version.clone(),
            cpu_type: Some(platform.cpu_type.clone()),
            cpu_subtype: platform.cpu_subtype.clone(),
            cpu_count: 0,
            memory_bytes: 0,
            environment: Address::NULL,
            creation_time: platform.creation_time,
        }
    }

    pub fn pointer_size(&self) -> usize {
        (self.pointer_bits / 8) as usize
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct VmOption {
    pub string: String,
    pub extra_info: Address,
}

/// Arguments the runtime was initialised with.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct VmInitArgs {
    pub version: i64,
    pub ignore_unrecognized: bool,
    pub options: Vec<VmOption>,
}
