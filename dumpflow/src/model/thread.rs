use crate::types::Address;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct StackFrame {
    pub method: Address,
    pub pc: Address,
    pub line: i64,
    /// Objects referenced from the frame.
    pub objects: Vec<Address>,
}

/// A thread of the dumped runtime.
///
/// `blocked_on` and `waiting_on` use the null address as the unset sentinel.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct JavaThread {
    pub id: Address,
    /// Backing `java/lang/Thread` instance.
    pub object: Address,
    pub native_id: Address,
    pub state: Option<String>,
    pub priority: i64,
    pub name: Option<String>,
    pub blocked_on: Address,
    pub waiting_on: Address,
    pub frames: Vec<StackFrame>,
}

impl JavaThread {
    pub fn new(id: Address) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Records the monitor the thread is parked on according to its textual state.
    ///
    /// Only the exact labels `Blocked` and `Waiting` carry a monitor, any other
    /// state leaves both references unset.
    pub fn classify_monitor(&mut self, monitor: Address) {
        match self.state.as_deref() {
            Some("Blocked") => self.blocked_on = monitor,
            Some("Waiting") => self.waiting_on = monitor,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(state: Option<&str>) -> JavaThread {
        let mut thread = JavaThread::new(0x10.into());
        thread.state = state.map(str::to_string);
        thread.classify_monitor(0x50.into());
        thread
    }

    #[test]
    fn blocked_and_waiting() {
        let blocked = thread(Some("Blocked"));
        assert_eq!(blocked.blocked_on, Address::from(0x50));
        assert!(blocked.waiting_on.is_null());

        let waiting = thread(Some("Waiting"));
        assert!(waiting.blocked_on.is_null());
        assert_eq!(waiting.waiting_on, Address::from(0x50));
    }

    #[test]
    fn other_states_carry_no_monitor() {
        for state in [Some("Running"), Some("blocked"), Some("WAITING"), None] {
            let t = thread(state);
            assert!(t.blocked_on.is_null());
            assert!(t.waiting_on.is_null());
        }
    }
}
