use bitflags::bitflags;

use crate::types::Address;

bitflags! {
    /// Runtime entities a heap object backs.
    #[cfg_attr(feature = "serde", derive(::serde::Serialize))]
    #[repr(transparent)]
    pub struct AssociationFlags: u8 {
        const NONE = 0b0000;
        const CLASS = 0b0001;
        const CLASSLOADER = 0b0010;
        const MONITOR = 0b0100;
        const THREAD = 0b1000;
    }
}

impl Default for AssociationFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// An object in a heap of the dumped runtime.
///
/// The owner fields are only meaningful when the corresponding flag is set.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaObject {
    pub id: Address,
    pub class: Address,
    pub size: u64,
    pub hashcode: u64,
    pub flags: AssociationFlags,
    pub associated_class: Address,
    pub associated_loader: Address,
    pub associated_monitor: Address,
    pub associated_thread: Address,
}

impl JavaObject {
    pub fn new(id: Address) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn set_associated_class(&mut self, class: Address) {
        self.flags |= AssociationFlags::CLASS;
        self.associated_class = class;
    }

    pub fn set_associated_loader(&mut self, loader: Address) {
        self.flags |= AssociationFlags::CLASSLOADER;
        self.associated_loader = loader;
    }

    pub fn set_associated_monitor(&mut self, monitor: Address) {
        self.flags |= AssociationFlags::MONITOR;
        self.associated_monitor = monitor;
    }

    pub fn set_associated_thread(&mut self, thread: Address) {
        self.flags |= AssociationFlags::THREAD;
        self.associated_thread = thread;
    }

    pub fn is_class(&self) -> bool {
        self.flags.contains(AssociationFlags::CLASS)
    }

    pub fn is_class_loader(&self) -> bool {
        self.flags.contains(AssociationFlags::CLASSLOADER)
    }

    pub fn is_monitor(&self) -> bool {
        self.flags.contains(AssociationFlags::MONITOR)
    }

    pub fn is_thread(&self) -> bool {
        self.flags.contains(AssociationFlags::THREAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associations_accumulate() {
        let mut obj = JavaObject::new(0x300.into());
        assert!(obj.flags.is_empty());

        obj.set_associated_loader(0x200.into());
        obj.set_associated_monitor(0x50.into());
        assert!(obj.is_class_loader());
        assert!(obj.is_monitor());
        assert!(!obj.is_class());
        assert!(!obj.is_thread());
        assert_eq!(obj.associated_loader, Address::from(0x200));
        assert_eq!(
            obj.flags,
            AssociationFlags::CLASSLOADER | AssociationFlags::MONITOR
        );
    }
}
