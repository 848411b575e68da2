/*!
The core image an index file describes.

A [`CoreImage`] holds the platform metadata of the dump and one or more address
spaces, each owning the processes found in it. Reconstruction attaches the runtimes
it finds to these processes.
*/

pub mod mapped;
#[doc(hidden)]
pub use mapped::{MappedMemory, MemoryRange};

use std::fmt;

use chrono::{DateTime, Utc};
use log::trace;

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::model::{FaultRecord, JavaRuntime};
use crate::types::Address;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum Endianness {
    Little,
    Big,
}

/// Layout information of an address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct SpaceMetadata {
    /// Size of a pointer in bytes.
    pub pointer_size: usize,
    pub endianness: Endianness,
}

impl SpaceMetadata {
    /// Creates metadata, clamping the pointer size to 1..=8 bytes.
    pub fn new(pointer_size: usize, endianness: Endianness) -> Self {
        Self {
            pointer_size: pointer_size.clamp(1, 8),
            endianness,
        }
    }
}

/// Read access to the memory of a dumped address space.
pub trait AddressSpace {
    fn metadata(&self) -> SpaceMetadata;

    /// Fills `out` with the bytes at `addr`, failing if any of them is unavailable.
    fn read_raw_into(&self, addr: Address, out: &mut [u8]) -> Result<()>;

    /// Reads a pointer sized value at `addr`.
    fn read_pointer(&self, addr: Address) -> Result<Address> {
        let meta = self.metadata();
        let mut buf = [0u8; 8];
        let buf = &mut buf[..meta.pointer_size.clamp(1, 8)];
        self.read_raw_into(addr, buf)?;

        let value = match meta.endianness {
            Endianness::Little => buf.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64),
            Endianness::Big => buf.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64),
        };
        Ok(Address::from(value))
    }
}

/// Platform metadata recorded in the core image itself.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct PlatformInfo {
    pub os_type: String,
    pub os_version: Option<String>,
    pub cpu_type: String,
    pub cpu_subtype: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    /// Size of a pointer in bytes.
    pub pointer_size: usize,
    pub endianness: Endianness,
}

impl PlatformInfo {
    pub fn new(os_type: &str, cpu_type: &str, pointer_size: usize, endianness: Endianness) -> Self {
        Self {
            os_type: os_type.to_string(),
            os_version: None,
            cpu_type: cpu_type.to_string(),
            cpu_subtype: None,
            creation_time: None,
            pointer_size,
            endianness,
        }
    }
}

/// A loaded native library.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct ImageModule {
    pub name: String,
    pub base: Address,
    pub size: u64,
}

/// A process found in the core image.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct ImageProcess {
    pub pid: u64,
    /// Address identifying the process inside its address space.
    pub id: Address,
    pub command_line: Option<String>,
    pub modules: Vec<ImageModule>,
    pub runtimes: Vec<JavaRuntime>,
    pub fault: Option<FaultRecord>,
    /// Set when the index could not be read completely for this process.
    pub extraction_failure: Option<Error>,
}

impl ImageProcess {
    pub fn new(pid: u64, id: Address) -> Self {
        Self {
            pid,
            id,
            ..Default::default()
        }
    }
}

/// An address inside a specific address space of the image.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct ImagePointer {
    pub space: usize,
    pub address: Address,
}

/// Reference to a process, by address space and position within it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct ProcessRef {
    pub space: usize,
    pub process: usize,
}

pub struct ImageAddressSpace {
    pub name: String,
    memory: Box<dyn AddressSpace>,
    processes: Vec<ImageProcess>,
}

impl ImageAddressSpace {
    pub fn new(name: &str, memory: Box<dyn AddressSpace>) -> Self {
        Self {
            name: name.to_string(),
            memory,
            processes: Vec::new(),
        }
    }

    pub fn with_process(mut self, process: ImageProcess) -> Self {
        self.processes.push(process);
        self
    }

    pub fn memory(&self) -> &dyn AddressSpace {
        self.memory.as_ref()
    }

    pub fn processes(&self) -> &[ImageProcess] {
        &self.processes
    }

    /// Splits the space into its memory and its processes, so a process can be
    /// mutated while memory is read.
    pub fn split_mut(&mut self) -> (&dyn AddressSpace, &mut [ImageProcess]) {
        (self.memory.as_ref(), &mut self.processes)
    }
}

impl fmt::Debug for ImageAddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ImageAddressSpace")
            .field("name", &self.name)
            .field("metadata", &self.memory.metadata())
            .field("processes", &self.processes)
            .finish()
    }
}

#[derive(Debug)]
pub struct CoreImage {
    platform: PlatformInfo,
    spaces: Vec<ImageAddressSpace>,
}

impl CoreImage {
    pub fn new(platform: PlatformInfo) -> Self {
        Self {
            platform,
            spaces: Vec::new(),
        }
    }

    pub fn with_space(mut self, space: ImageAddressSpace) -> Self {
        self.spaces.push(space);
        self
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    pub fn spaces(&self) -> &[ImageAddressSpace] {
        &self.spaces
    }

    /// Enumerates every (address space, process) pair in image order.
    pub fn process_refs(&self) -> impl Iterator<Item = ProcessRef> + '_ {
        self.spaces.iter().enumerate().flat_map(|(space, s)| {
            (0..s.processes.len()).map(move |process| ProcessRef { space, process })
        })
    }

    pub fn process(&self, r: ProcessRef) -> Option<&ImageProcess> {
        self.spaces.get(r.space)?.processes.get(r.process)
    }

    pub fn process_mut(&mut self, r: ProcessRef) -> Option<&mut ImageProcess> {
        self.spaces.get_mut(r.space)?.processes.get_mut(r.process)
    }

    /// Returns the memory of the space `r` lives in together with the process itself.
    pub fn process_with_memory(
        &mut self,
        r: ProcessRef,
    ) -> Result<(&dyn AddressSpace, &mut ImageProcess)> {
        let not_found = || Error(ErrorOrigin::Image, ErrorKind::ProcessNotFound);
        let (memory, processes) = self.spaces.get_mut(r.space).ok_or_else(not_found)?.split_mut();
        let process = processes.get_mut(r.process).ok_or_else(not_found)?;
        Ok((memory, process))
    }

    /// Creates a pointer to `raw` in address space `space`.
    pub fn pointer(&self, space: usize, raw: i64) -> Result<ImagePointer> {
        if space >= self.spaces.len() {
            return Err(Error(ErrorOrigin::Image, ErrorKind::NotFound)
                .log_debug(format!("address space {} does not exist", space)));
        }
        Ok(ImagePointer {
            space,
            address: Address::from(raw),
        })
    }

    /// Scans `slots` pointer sized slots starting at the process identifier for `environment`.
    ///
    /// Unreadable slots end the scan without a match.
    pub fn matches_environment(&self, r: ProcessRef, environment: ImagePointer, slots: usize) -> bool {
        let space = match self.spaces.get(r.space) {
            Some(space) if environment.space == r.space => space,
            _ => return false,
        };
        let process = match space.processes.get(r.process) {
            Some(process) => process,
            None => return false,
        };

        let pointer_size = space.memory.metadata().pointer_size as u64;
        for slot in 0..slots as u64 {
            let addr = process.id.wrapping_add(slot * pointer_size);
            match space.memory.read_pointer(addr) {
                Ok(value) if value == environment.address => {
                    trace!(
                        "process {} references environment {:x} at {:x}",
                        process.pid,
                        value,
                        addr
                    );
                    return true;
                }
                Ok(_) => {}
                Err(_) => return false,
            }
        }
        false
    }

    /// Records `err` as the extraction failure of every process.
    pub fn mark_failed(&mut self, err: Error) {
        for space in self.spaces.iter_mut() {
            for process in space.processes.iter_mut() {
                process.extraction_failure = Some(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> CoreImage {
        let mut buf = vec![0u8; 0x40];
        // environment pointer in the third slot of the second process
        buf[0x30..0x38].copy_from_slice(&0x7f00_0000_1000u64.to_le_bytes());
        let mut mem = MappedMemory::from_buffer(buf, SpaceMetadata::new(8, Endianness::Little));
        mem.push_range(0x1000.into(), 0x40, 0).unwrap();

        CoreImage::new(PlatformInfo::new("Linux", "amd64", 8, Endianness::Little)).with_space(
            ImageAddressSpace::new("core", Box::new(mem))
                .with_process(ImageProcess::new(1, 0x1000.into()))
                .with_process(ImageProcess::new(2, 0x1020.into())),
        )
    }

    #[test]
    fn enumerates_processes() {
        let image = image();
        let refs = image.process_refs().collect::<Vec<_>>();
        assert_eq!(refs.len(), 2);
        assert_eq!(image.process(refs[1]).unwrap().pid, 2);
    }

    #[test]
    fn environment_heuristic() {
        let image = image();
        let env = image.pointer(0, 0x7f00_0000_1000).unwrap();
        let first = ProcessRef { space: 0, process: 0 };
        let second = ProcessRef { space: 0, process: 1 };

        assert!(image.matches_environment(second, env, 4));
        assert!(!image.matches_environment(second, env, 2));
        // the scan from the first process runs into the slot as well
        assert!(image.matches_environment(first, env, 8));
        assert!(!image.matches_environment(first, env, 6));
        assert!(image.pointer(1, 0).is_err());
    }

    #[test]
    fn mark_failed_reaches_every_process() {
        let mut image = image();
        let err = Error(ErrorOrigin::Tokenizer, ErrorKind::MalformedDocument);
        image.mark_failed(err);
        assert!(image
            .process_refs()
            .all(|r| image.process(r).unwrap().extraction_failure == Some(err)));
    }
}
