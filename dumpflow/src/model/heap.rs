use crate::types::Address;

/// The two on-disk layouts of a heap element.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum HeapShape {
    /// Alignment and minimum object size on the heap itself, one implicit region.
    Legacy,
    /// Explicit region children.
    Regions,
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct HeapRegion {
    pub id: Address,
    pub name: Option<String>,
    pub start: Address,
    pub end: Address,
    pub object_alignment: u64,
    pub minimum_object_size: u64,
    pub page_size: u64,
    /// Objects listed for this region, in index order.
    pub objects: Vec<Address>,
}

impl HeapRegion {
    pub fn new(start: Address, end: Address) -> Self {
        Self {
            id: Address::NULL,
            name: None,
            start,
            end,
            object_alignment: 0,
            minimum_object_size: 0,
            page_size: 0,
            objects: Vec::new(),
        }
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr < self.end
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaHeap {
    pub id: Address,
    pub name: Option<String>,
    pub start: Address,
    pub end: Address,
    pub shape: HeapShape,
    pub regions: Vec<HeapRegion>,
}

impl JavaHeap {
    pub fn new(id: Address, shape: HeapShape) -> Self {
        Self {
            id,
            name: None,
            start: Address::NULL,
            end: Address::NULL,
            shape,
            regions: Vec::new(),
        }
    }

    pub fn region_containing(&self, addr: Address) -> Option<&HeapRegion> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    /// Number of objects listed across all regions.
    pub fn object_count(&self) -> usize {
        self.regions.iter().map(|r| r.objects.len()).sum()
    }
}
