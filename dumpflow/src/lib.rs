//!
//! # dumpflow
//!
//! Managed runtime state from core dump index files
//!
//! ## Introduction
//!
//! A core dump of a Java process only holds raw memory. Tools that extract the runtime
//! state at dump time write it out as an XML index next to the dump: the platform, the
//! process, its virtual machines and their classes, heaps, threads, monitors and
//! garbage collection roots. dumpflow reads such an index and rebuilds that state on
//! top of a [`CoreImage`](crate::image::CoreImage), the memory of the dump.
//!
//! ```text
//!   index file          +-----------------+     +-------------+     +-----------+
//!  ---------------->----| TagRepairStream |---->|  tokenizer  |---->| dispatch  |
//!                       +-----------------+     +-------------+     +-----+-----+
//!                                                                         |
//!                       +-----------------+     +-------------+           |
//!   DumpModel  <--------|   resolution    |<----| node stack  |<----------+
//!                       +--------+--------+     +-------------+
//!                                |
//!                       +--------v--------+
//!                       |   CoreImage     |
//!                       +-----------------+
//! ```
//!
//! Index files written by crashing processes are frequently cut short or carry tags
//! that were never closed. The [repair](crate::repair) stream fixes those on the fly,
//! so a damaged index still yields everything up to the point of damage.
//!
//! # Structure
//!
//! [image](crate::image) describes the dump the index belongs to, [model](crate::model)
//! holds the reconstructed runtime entities, [index](crate::index) contains the
//! reconstruction pipeline while [repair](crate::repair) and [numeric](crate::numeric)
//! deal with the raw text of the index.
//!
//! ## Getting started
//!
//! ```
//! use dumpflow::prelude::v1::*;
//!
//! let mut memory = MappedMemory::from_buffer(vec![0; 0x100], SpaceMetadata::new(8, Endianness::Little));
//! memory.push_range(Address::from(0x1000), 0x100, 0).unwrap();
//!
//! let image = CoreImage::new(PlatformInfo::new("Linux", "amd64", 8, Endianness::Little))
//!     .with_space(
//!         ImageAddressSpace::new("core", Box::new(memory))
//!             .with_process(ImageProcess::new(1, Address::from(0x1000))),
//!     );
//!
//! let index = r#"<j9dump size="64"><javavm id="0x7f00"><class id="0x100" name="Foo"/>"#;
//! let model = reconstruct(index.as_bytes(), image);
//!
//! assert!(!model.is_degraded());
//! assert_eq!(model.process().unwrap().runtimes[0].classes().len(), 1);
//! ```

// address arithmetic mixes u64 and usize which are the same width on the supported targets
#![allow(clippy::unnecessary_cast)]

pub mod error;

pub mod types;

pub mod numeric;

pub mod args;

pub mod repair;

pub mod image;

pub mod model;

pub mod index;

#[doc(hidden)]
pub mod prelude {
    pub mod v1 {
        pub use crate::args::*;
        pub use crate::error::*;
        pub use crate::image::*;
        pub use crate::index::{reconstruct, reconstruct_with_options, DumpModel, ReportedError};
        pub use crate::model::*;
        pub use crate::repair::*;
        pub use crate::types::*;
    }
    pub use v1::*;
}
