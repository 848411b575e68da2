use std::fmt;

use crate::types::Address;

/// The kind of a garbage collection root.
///
/// Decoded from the `type` label of a root element, unknown labels map to `Other`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum RootKind {
    Class,
    ClassLoader,
    SystemClass,
    Thread,
    StackSlot,
    JniLocal,
    JniGlobal,
    JniWeakGlobal,
    StringTable,
    Monitor,
    ThreadMonitor,
    Finalizable,
    Unfinalized,
    OwnableSynchronizer,
    VmClassSlot,
    RememberedSet,
    SoftReference,
    WeakReference,
    PhantomReference,
    Other,
}

impl RootKind {
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("Class") => RootKind::Class,
            Some("ClassLoader") => RootKind::ClassLoader,
            Some("SystemClass") => RootKind::SystemClass,
            Some("Thread") => RootKind::Thread,
            Some("StackSlot") => RootKind::StackSlot,
            Some("JNILocalReference") => RootKind::JniLocal,
            Some("JNIGlobalReference") => RootKind::JniGlobal,
            Some("JNIWeakGlobalReference") => RootKind::JniWeakGlobal,
            Some("StringTable") => RootKind::StringTable,
            Some("Monitor") => RootKind::Monitor,
            Some("ThreadMonitor") => RootKind::ThreadMonitor,
            Some("Finalizable") => RootKind::Finalizable,
            Some("Unfinalized") => RootKind::Unfinalized,
            Some("OwnableSynchronizer") => RootKind::OwnableSynchronizer,
            Some("VMClassSlot") => RootKind::VmClassSlot,
            Some("RememberedSet") => RootKind::RememberedSet,
            Some("SoftReference") => RootKind::SoftReference,
            Some("WeakReference") => RootKind::WeakReference,
            Some("PhantomReference") => RootKind::PhantomReference,
            _ => RootKind::Other,
        }
    }

    pub fn to_str(self) -> &'static str {
        match self {
            RootKind::Class => "class-root",
            RootKind::ClassLoader => "classloader-root",
            RootKind::SystemClass => "system-class-root",
            RootKind::Thread => "thread-root",
            RootKind::StackSlot => "stack-slot-root",
            RootKind::JniLocal => "jni-local-root",
            RootKind::JniGlobal => "jni-global-root",
            RootKind::JniWeakGlobal => "jni-weak-global-root",
            RootKind::StringTable => "string-table-root",
            RootKind::Monitor => "monitor-root",
            RootKind::ThreadMonitor => "thread-monitor-root",
            RootKind::Finalizable => "finalizable-root",
            RootKind::Unfinalized => "unfinalized-root",
            RootKind::OwnableSynchronizer => "ownable-synchronizer-root",
            RootKind::VmClassSlot => "vm-class-slot-root",
            RootKind::RememberedSet => "remembered-set-root",
            RootKind::SoftReference => "soft-reference-root",
            RootKind::WeakReference => "weak-reference-root",
            RootKind::PhantomReference => "phantom-reference-root",
            RootKind::Other => "other",
        }
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub enum Reachability {
    Strong,
    Weak,
    Soft,
    Phantom,
    Unknown,
}

impl Reachability {
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("strong") => Reachability::Strong,
            Some("weak") => Reachability::Weak,
            Some("soft") => Reachability::Soft,
            Some("phantom") => Reachability::Phantom,
            _ => Reachability::Unknown,
        }
    }

    pub fn to_str(self) -> &'static str {
        match self {
            Reachability::Strong => "strong",
            Reachability::Weak => "weak",
            Reachability::Soft => "soft",
            Reachability::Phantom => "phantom",
            Reachability::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct GcRoot {
    pub kind: RootKind,
    pub reachability: Reachability,
    /// Address of the object kept alive.
    pub address: Address,
    /// Entity holding the reference, e.g. the owning thread of a stack slot.
    pub source: Address,
    pub description: Option<String>,
}
