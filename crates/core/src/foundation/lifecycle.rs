use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle states of a single constructed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstanceState {
    Unresolved,
    Constructed,
    Depended,
    Initialized,
    Destroyed,
}

impl InstanceState {
    fn as_u8(self) -> u8 {
        match self {
            InstanceState::Unresolved => 0,
            InstanceState::Constructed => 1,
            InstanceState::Depended => 2,
            InstanceState::Initialized => 3,
            InstanceState::Destroyed => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => InstanceState::Unresolved,
            1 => InstanceState::Constructed,
            2 => InstanceState::Depended,
            3 => InstanceState::Initialized,
            _ => InstanceState::Destroyed,
        }
    }
}

/// Atomic holder for an [`InstanceState`]
#[derive(Debug)]
pub struct StateCell {
    state: AtomicU8,
}

impl StateCell {
    pub fn new(state: InstanceState) -> Self {
        Self {
            state: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> InstanceState {
        InstanceState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Move to `state`; a destroyed instance stays destroyed
    pub fn set(&self, state: InstanceState) {
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if current == InstanceState::Destroyed.as_u8() {
                    None
                } else {
                    Some(state.as_u8())
                }
            });
    }

    pub fn is_destroyed(&self) -> bool {
        self.get() == InstanceState::Destroyed
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(InstanceState::Unresolved)
    }
}
