use crate::types::Address;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaMonitor {
    pub id: Address,
    /// Object the monitor guards, null for raw monitors.
    pub object: Address,
    pub owner: Address,
    pub name: Option<String>,
    /// Threads blocked on entering the monitor.
    pub enter_waiters: Vec<Address>,
    /// Threads waiting to be notified.
    pub notify_waiters: Vec<Address>,
}

impl JavaMonitor {
    pub fn new(id: Address) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_raw(&self) -> bool {
        self.object.is_null()
    }
}
