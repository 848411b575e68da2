use hashbrown::HashMap;
use log::debug;
use rangemap::RangeMap;

use super::{
    GcRoot, HeapRegion, JavaClass, JavaClassLoader, JavaHeap, JavaMonitor, JavaObject,
    JavaThread, VmInitArgs,
};
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};
use crate::image::AddressSpace;
use crate::types::Address;

/// Arena of one runtime instance attached to a process.
///
/// Entities are stored in insertion order and looked up by runtime id. Links between
/// entities are plain ids, resolved through the lookup functions.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaRuntime {
    pub id: Address,
    pub version: Option<String>,
    pub vm_init_args: Option<VmInitArgs>,

    classes: Vec<JavaClass>,
    loaders: Vec<JavaClassLoader>,
    heaps: Vec<JavaHeap>,
    threads: Vec<JavaThread>,
    monitors: Vec<JavaMonitor>,
    roots: Vec<GcRoot>,
    objects: Vec<JavaObject>,

    #[cfg_attr(feature = "serde", serde(skip))]
    class_index: HashMap<Address, usize>,
    #[cfg_attr(feature = "serde", serde(skip))]
    loader_index: HashMap<Address, usize>,
    #[cfg_attr(feature = "serde", serde(skip))]
    thread_index: HashMap<Address, usize>,
    #[cfg_attr(feature = "serde", serde(skip))]
    monitor_index: HashMap<Address, usize>,
    #[cfg_attr(feature = "serde", serde(skip))]
    object_index: HashMap<Address, usize>,
    /// (heap, region) index by address range.
    #[cfg_attr(feature = "serde", serde(skip))]
    region_map: RangeMap<u64, (usize, usize)>,
}

fn register(index: &mut HashMap<Address, usize>, id: Address, idx: usize, what: &str) {
    if index.insert(id, idx).is_some() {
        debug!("{} {:x} listed twice, keeping the later entry", what, id);
    }
}

impl JavaRuntime {
    pub fn new(id: Address) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn add_class(&mut self, class: JavaClass) -> usize {
        let idx = self.classes.len();
        register(&mut self.class_index, class.id, idx, "class");
        self.classes.push(class);
        idx
    }

    pub fn classes(&self) -> &[JavaClass] {
        &self.classes
    }

    pub fn class(&self, id: Address) -> Option<&JavaClass> {
        self.class_index.get(&id).map(|&idx| &self.classes[idx])
    }

    pub fn class_at_mut(&mut self, idx: usize) -> Option<&mut JavaClass> {
        self.classes.get_mut(idx)
    }

    pub fn add_class_loader(&mut self, loader: JavaClassLoader) -> usize {
        let idx = self.loaders.len();
        register(&mut self.loader_index, loader.id, idx, "class loader");
        self.loaders.push(loader);
        idx
    }

    pub fn class_loaders(&self) -> &[JavaClassLoader] {
        &self.loaders
    }

    pub fn class_loader(&self, id: Address) -> Option<&JavaClassLoader> {
        self.loader_index.get(&id).map(|&idx| &self.loaders[idx])
    }

    pub fn class_loader_at_mut(&mut self, idx: usize) -> Option<&mut JavaClassLoader> {
        self.loaders.get_mut(idx)
    }

    pub fn add_heap(&mut self, heap: JavaHeap) -> usize {
        self.heaps.push(heap);
        self.heaps.len() - 1
    }

    pub fn heaps(&self) -> &[JavaHeap] {
        &self.heaps
    }

    pub fn heap_at_mut(&mut self, idx: usize) -> Option<&mut JavaHeap> {
        self.heaps.get_mut(idx)
    }

    /// Makes the regions of a completely parsed heap available to address lookups.
    pub fn register_heap_regions(&mut self, heap_idx: usize) {
        let heap = match self.heaps.get(heap_idx) {
            Some(heap) => heap,
            None => return,
        };

        for (region_idx, region) in heap.regions.iter().enumerate() {
            let range = region.start.to_umem()..region.end.to_umem();
            if range.is_empty() {
                debug!(
                    "heap {:x} region {:x}-{:x} is empty",
                    heap.id, region.start, region.end
                );
                continue;
            }
            if self.region_map.overlaps(&range) {
                debug!(
                    "heap {:x} region {:x}-{:x} overlaps a previous region",
                    heap.id, region.start, region.end
                );
            }
            self.region_map.insert(range, (heap_idx, region_idx));
        }
    }

    /// Finds the heap region spanning `addr`.
    pub fn region_containing(&self, addr: Address) -> Option<&HeapRegion> {
        self.region_map
            .get(&addr.to_umem())
            .and_then(|&(heap, region)| self.heaps.get(heap)?.regions.get(region))
    }

    pub fn add_thread(&mut self, thread: JavaThread) -> usize {
        let idx = self.threads.len();
        register(&mut self.thread_index, thread.id, idx, "thread");
        self.threads.push(thread);
        idx
    }

    pub fn threads(&self) -> &[JavaThread] {
        &self.threads
    }

    pub fn thread(&self, id: Address) -> Option<&JavaThread> {
        self.thread_index.get(&id).map(|&idx| &self.threads[idx])
    }

    pub fn thread_at_mut(&mut self, idx: usize) -> Option<&mut JavaThread> {
        self.threads.get_mut(idx)
    }

    pub fn add_monitor(&mut self, monitor: JavaMonitor) -> usize {
        let idx = self.monitors.len();
        register(&mut self.monitor_index, monitor.id, idx, "monitor");
        self.monitors.push(monitor);
        idx
    }

    pub fn monitors(&self) -> &[JavaMonitor] {
        &self.monitors
    }

    pub fn monitor(&self, id: Address) -> Option<&JavaMonitor> {
        self.monitor_index.get(&id).map(|&idx| &self.monitors[idx])
    }

    pub fn monitor_mut(&mut self, id: Address) -> Option<&mut JavaMonitor> {
        let idx = *self.monitor_index.get(&id)?;
        self.monitors.get_mut(idx)
    }

    pub fn add_root(&mut self, root: GcRoot) {
        self.roots.push(root);
    }

    pub fn roots(&self) -> &[GcRoot] {
        &self.roots
    }

    /// Records an object listed in the index.
    ///
    /// Listing the same object twice updates the descriptive fields and keeps
    /// associations made so far.
    pub fn add_object(&mut self, object: JavaObject) -> usize {
        if let Some(&idx) = self.object_index.get(&object.id) {
            let known = &mut self.objects[idx];
            known.class = object.class;
            known.size = object.size;
            known.hashcode = object.hashcode;
            return idx;
        }

        let idx = self.objects.len();
        self.object_index.insert(object.id, idx);
        self.objects.push(object);
        idx
    }

    pub fn objects(&self) -> &[JavaObject] {
        &self.objects
    }

    pub fn object(&self, id: Address) -> Option<&JavaObject> {
        self.object_index.get(&id).map(|&idx| &self.objects[idx])
    }

    pub fn object_at_mut(&mut self, idx: usize) -> Option<&mut JavaObject> {
        self.objects.get_mut(idx)
    }

    /// Resolves `addr` to a live heap object and returns its arena index.
    ///
    /// Objects already known are returned directly. Any other address must lie inside
    /// a heap region, honour the region's object alignment and be readable in `space`.
    pub fn object_at(&mut self, space: &dyn AddressSpace, addr: Address) -> Result<usize> {
        if let Some(&idx) = self.object_index.get(&addr) {
            return Ok(idx);
        }

        if addr.is_null() {
            return Err(Error(ErrorOrigin::Resolution, ErrorKind::NotFound));
        }

        let region = self.region_containing(addr).ok_or_else(|| {
            Error(ErrorOrigin::Resolution, ErrorKind::OutOfHeapRange)
                .log_trace(format!("{:x} is outside of every heap region", addr))
        })?;

        if !addr.is_aligned(region.object_alignment) {
            return Err(Error(ErrorOrigin::Resolution, ErrorKind::CorruptData).log_trace(
                format!(
                    "{:x} is not aligned to {:#x}",
                    addr, region.object_alignment
                ),
            ));
        }

        // the first slot of an object holds its class
        let header = space.read_pointer(addr).map_err(|err| {
            Error(ErrorOrigin::Resolution, ErrorKind::DataUnavailable)
                .log_trace(format!("{:x}: {}", addr, err))
        })?;

        let mut object = JavaObject::new(addr);
        if self.class_index.contains_key(&header) {
            object.class = header;
        }
        Ok(self.add_object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Endianness, MappedMemory, SpaceMetadata};
    use crate::model::{ClassKind, HeapShape};

    fn runtime() -> JavaRuntime {
        let mut rt = JavaRuntime::new(0x10.into());
        rt.add_class(JavaClass::new(0x100.into(), ClassKind::Class));

        let mut heap = JavaHeap::new(0x1.into(), HeapShape::Regions);
        let mut region = HeapRegion::new(0x1000.into(), 0x2000.into());
        region.object_alignment = 8;
        heap.regions.push(region);
        heap.regions.push(HeapRegion::new(0x3000.into(), 0x3000.into()));
        let idx = rt.add_heap(heap);
        rt.register_heap_regions(idx);
        rt
    }

    fn memory() -> MappedMemory {
        let mut buf = vec![0u8; 0x20];
        buf[0x10] = 0x00;
        buf[0x11] = 0x01;
        let mut mem = MappedMemory::from_buffer(buf, SpaceMetadata::new(8, Endianness::Little));
        mem.push_range(0x1000.into(), 0x20, 0).unwrap();
        mem
    }

    #[test]
    fn lookup_by_id() {
        let mut rt = runtime();
        rt.add_thread(JavaThread::new(0x20.into()));
        assert!(rt.class(0x100.into()).is_some());
        assert!(rt.class(0x101.into()).is_none());
        assert!(rt.thread(0x20.into()).is_some());
        assert!(rt.region_containing(0x1fff.into()).is_some());
        assert!(rt.region_containing(0x2000.into()).is_none());
        assert!(rt.region_containing(0x3000.into()).is_none());
    }

    #[test]
    fn object_at_probes_memory() {
        let mut rt = runtime();
        let mem = memory();

        let idx = rt.object_at(&mem, 0x1010.into()).unwrap();
        assert_eq!(rt.objects()[idx].id, Address::from(0x1010));
        assert_eq!(rt.objects()[idx].class, Address::from(0x100));
        assert_eq!(rt.object_at(&mem, 0x1010.into()).unwrap(), idx);
        assert_eq!(rt.objects().len(), 1);

        let idx = rt.object_at(&mem, 0x1000.into()).unwrap();
        assert!(rt.objects()[idx].class.is_null());
    }

    #[test]
    fn object_at_failures() {
        let mut rt = runtime();
        let mem = memory();

        let kind = |r: Result<usize>| r.unwrap_err().kind();
        assert_eq!(kind(rt.object_at(&mem, 0x4000.into())), ErrorKind::OutOfHeapRange);
        assert_eq!(kind(rt.object_at(&mem, 0x1004.into())), ErrorKind::CorruptData);
        assert_eq!(kind(rt.object_at(&mem, 0x1800.into())), ErrorKind::DataUnavailable);
        assert_eq!(kind(rt.object_at(&mem, Address::NULL)), ErrorKind::NotFound);
        assert!(rt.objects().is_empty());
    }

    #[test]
    fn relisted_object_keeps_associations() {
        let mut rt = runtime();
        let mut obj = JavaObject::new(0x1010.into());
        obj.set_associated_thread(0x20.into());
        let idx = rt.add_object(obj);

        let mut again = JavaObject::new(0x1010.into());
        again.size = 24;
        assert_eq!(rt.add_object(again), idx);
        assert!(rt.objects()[idx].is_thread());
        assert_eq!(rt.objects()[idx].size, 24);
    }
}
