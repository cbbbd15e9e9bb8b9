// SPDX-License-Identifier: CEPL-1.0

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Live,
    Destroyed,
}

/// Slot for a GPU resource that is created and destroyed explicitly.
///
/// `take_live` hands the resource out exactly once, so a second destroy
/// finds nothing to release.
#[derive(Debug, Default)]
pub enum Lifecycle<T> {
    #[default]
    Uninitialized,
    Live(T),
    Destroyed,
}

impl<T> Lifecycle<T> {
    pub fn state(&self) -> LifecycleState {
        match self {
            Self::Uninitialized => LifecycleState::Uninitialized,
            Self::Live(_) => LifecycleState::Live,
            Self::Destroyed => LifecycleState::Destroyed,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn live(&self) -> Option<&T> {
        match self {
            Self::Live(v) => Some(v),
            _ => None,
        }
    }

    pub fn live_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Live(v) => Some(v),
            _ => None,
        }
    }

    /// Stores a new live value and returns the one it replaces, which the
    /// caller still has to destroy.
    #[must_use]
    pub fn set(&mut self, value: T) -> Option<T> {
        match std::mem::replace(self, Self::Live(value)) {
            Self::Live(old) => Some(old),
            _ => None,
        }
    }

    /// Stores a new live value; a value it displaces goes to `release`.
    pub fn replace_with(&mut self, value: T, release: impl FnOnce(T)) {
        if let Some(old) = self.set(value) {
            release(old);
        }
    }

    /// Moves the live value out and marks the slot destroyed.
    pub fn take_live(&mut self) -> Option<T> {
        if !self.is_live() {
            return None;
        }
        match std::mem::replace(self, Self::Destroyed) {
            Self::Live(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_live_is_idempotent() {
        let mut slot = Lifecycle::default();
        assert_eq!(slot.state(), LifecycleState::Uninitialized);
        assert!(slot.take_live().is_none());
        assert_eq!(slot.state(), LifecycleState::Uninitialized);

        assert!(slot.set(7u32).is_none());
        assert_eq!(slot.live(), Some(&7));
        assert_eq!(slot.take_live(), Some(7));
        assert_eq!(slot.state(), LifecycleState::Destroyed);
        assert!(slot.take_live().is_none());
        assert_eq!(slot.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn set_returns_replaced_value() {
        let mut slot = Lifecycle::default();
        assert!(slot.set("a").is_none());
        assert_eq!(slot.set("b"), Some("a"));
        assert_eq!(slot.live(), Some(&"b"));
    }

    #[test]
    fn replace_with_releases_displaced_value() {
        let mut released = Vec::new();
        let mut slot = Lifecycle::default();
        slot.replace_with(1, |old| released.push(old));
        assert!(released.is_empty());
        slot.replace_with(2, |old| released.push(old));
        assert_eq!(released, vec![1]);
        assert_eq!(slot.live(), Some(&2));

        slot.take_live();
        slot.replace_with(3, |old| released.push(old));
        assert_eq!(released, vec![1]);
    }

    #[test]
    fn destroyed_slot_can_be_revived() {
        let mut slot = Lifecycle::Live(1);
        slot.take_live();
        assert!(slot.set(2).is_none());
        assert!(slot.is_live());
    }
}
