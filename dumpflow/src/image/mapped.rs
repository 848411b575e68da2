#[cfg(any(feature = "filemap", feature = "memmapfiles"))]
use std::path::Path;

use log::debug;
#[cfg(feature = "filemap")]
use log::info;

use super::{AddressSpace, SpaceMetadata};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::types::Address;

/// A single mapping from a range of dumped addresses to an offset in the image buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct MemoryRange {
    pub base: Address,
    pub length: u64,
    pub file_offset: u64,
}

impl MemoryRange {
    pub fn end(&self) -> Address {
        self.base.wrapping_add(self.length)
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.base <= addr && addr < self.end()
    }
}

#[cfg(feature = "memmapfiles")]
#[derive(::serde::Deserialize)]
struct MemoryMapFile {
    #[serde(rename = "range")]
    ranges: Vec<MemoryMapFileRange>,
}

#[cfg(feature = "memmapfiles")]
#[derive(::serde::Deserialize)]
struct MemoryMapFileRange {
    base: u64,
    length: u64,
    file_offset: Option<u64>,
}

enum Backing {
    Owned(Vec<u8>),
    #[cfg(feature = "filemap")]
    File(memmap::Mmap),
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Owned(buf) => buf.as_slice(),
            #[cfg(feature = "filemap")]
            Backing::File(map) => &map[..],
        }
    }
}

/// Read-only address space backed by an in-memory or memory-mapped image.
///
/// Ranges are kept sorted by base address and never overlap.
///
/// # Examples
///
/// ```
/// use dumpflow::image::{AddressSpace, Endianness, MappedMemory, SpaceMetadata};
///
/// let mut mem = MappedMemory::from_buffer(
///     vec![0x11, 0x22, 0x33, 0x44],
///     SpaceMetadata::new(4, Endianness::Little),
/// );
/// mem.push_range(0x1000.into(), 4, 0).unwrap();
///
/// let mut buf = [0u8; 2];
/// mem.read_raw_into(0x1002.into(), &mut buf).unwrap();
/// assert_eq!(buf, [0x33, 0x44]);
/// assert!(mem.read_raw_into(0x2000.into(), &mut buf).is_err());
/// ```
pub struct MappedMemory {
    backing: Backing,
    ranges: Vec<MemoryRange>,
    metadata: SpaceMetadata,
}

impl MappedMemory {
    /// Creates an empty map over an owned buffer.
    pub fn from_buffer(buf: Vec<u8>, metadata: SpaceMetadata) -> Self {
        Self {
            backing: Backing::Owned(buf),
            ranges: Vec::new(),
            metadata,
        }
    }

    /// Maps the core file at `path` read-only into memory.
    #[cfg(feature = "filemap")]
    pub fn open_file<P: AsRef<Path>>(path: P, metadata: SpaceMetadata) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|err| {
            Error(ErrorOrigin::Image, ErrorKind::UnableToReadFile)
                .log_error(format!("{}: {}", path.as_ref().display(), err))
        })?;

        let map = unsafe {
            memmap::MmapOptions::new().map(&file).map_err(|err| {
                Error(ErrorOrigin::Image, ErrorKind::UnableToMapFile)
                    .log_error(format!("{}: {}", path.as_ref().display(), err))
            })?
        };

        info!(
            "mapped core file {} ({:#x} bytes)",
            path.as_ref().display(),
            map.len()
        );

        Ok(Self {
            backing: Backing::File(map),
            ranges: Vec::new(),
            metadata,
        })
    }

    /// Loads the address ranges from a [TOML](https://toml.io/) file.
    ///
    /// The file must contain a range table in the following format:
    ///
    /// ```toml
    /// [[range]]
    /// base=0x1000
    /// length=0x1000
    ///
    /// [[range]]
    /// base=0x7f0000000000
    /// length=0x2000
    /// file_offset=0x1000
    /// ```
    ///
    /// A missing `file_offset` places the range directly behind the previous one.
    #[cfg(feature = "memmapfiles")]
    pub fn load_ranges<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            Error(ErrorOrigin::Image, ErrorKind::UnableToReadFile)
                .log_error(format!("{}: {}", path.as_ref().display(), err))
        })?;
        self.parse_ranges(&contents)
    }

    /// Parses a range table in the format accepted by [`load_ranges`](Self::load_ranges).
    #[cfg(feature = "memmapfiles")]
    pub fn parse_ranges(&mut self, contents: &str) -> Result<&mut Self> {
        let file: MemoryMapFile = toml::from_str(contents).map_err(|err| {
            Error(ErrorOrigin::Image, ErrorKind::Configuration)
                .log_error(format!("unable to parse the memory map: {}", err))
        })?;

        let mut next_offset = 0;
        for range in file.ranges.iter() {
            let file_offset = range.file_offset.unwrap_or(next_offset);
            self.push_range(range.base.into(), range.length, file_offset)?;
            next_offset = file_offset + range.length;
        }

        Ok(self)
    }

    /// Adds a mapping of `length` bytes at `base` to `file_offset` in the backing buffer.
    ///
    /// Empty ranges are ignored.
    pub fn push_range(&mut self, base: Address, length: u64, file_offset: u64) -> Result<&mut Self> {
        if length == 0 {
            return Ok(self);
        }

        let range = MemoryRange {
            base,
            length,
            file_offset,
        };

        if base.to_umem().checked_add(length).is_none() {
            return Err(Error(ErrorOrigin::Image, ErrorKind::OutOfMemoryRange)
                .log_error(format!("range {:x}+{:x} wraps around", base, length)));
        }

        let idx = self.ranges.partition_point(|m| m.base < base);
        let overlaps_prev = idx > 0 && self.ranges[idx - 1].end() > base;
        let overlaps_next = idx < self.ranges.len() && self.ranges[idx].base < range.end();
        if overlaps_prev || overlaps_next {
            return Err(Error(ErrorOrigin::Image, ErrorKind::MemoryMapOverlap)
                .log_error(format!("{:x}-{:x}", base, range.end())));
        }

        debug!(
            "mapping {:x}-{:x} to offset {:#x}",
            base,
            range.end(),
            file_offset
        );
        self.ranges.insert(idx, range);
        Ok(self)
    }

    pub fn ranges(&self) -> &[MemoryRange] {
        &self.ranges
    }

    fn find_range(&self, addr: Address) -> Option<&MemoryRange> {
        let idx = self.ranges.partition_point(|m| m.base <= addr);
        idx.checked_sub(1)
            .map(|idx| &self.ranges[idx])
            .filter(|m| m.contains(addr))
    }
}

impl AddressSpace for MappedMemory {
    fn metadata(&self) -> SpaceMetadata {
        self.metadata
    }

    fn read_raw_into(&self, addr: Address, out: &mut [u8]) -> Result<()> {
        let data = self.backing.as_slice();

        let mut cur = addr;
        let mut done = 0;
        while done < out.len() {
            let range = self.find_range(cur).ok_or_else(|| {
                Error(ErrorOrigin::AddressSpace, ErrorKind::OutOfMemoryRange)
                    .log_trace(format!("{:x} is not mapped", cur))
            })?;

            let in_range = (cur - range.base) as usize;
            let chunk = std::cmp::min(out.len() - done, range.length as usize - in_range);
            let start = range.file_offset as usize + in_range;

            let src = data.get(start..start + chunk).ok_or_else(|| {
                Error(ErrorOrigin::AddressSpace, ErrorKind::DataUnavailable)
                    .log_trace(format!("{:x} is mapped beyond the end of the image", cur))
            })?;
            out[done..done + chunk].copy_from_slice(src);

            done += chunk;
            cur = cur.wrapping_add(chunk as u64);
        }

        Ok(())
    }
}
