//! Ownership of the single active-popup slot.
//!
//! Every popup is built with a handle to the same [`MenuCoordinator`].
//! Opening a popup registers it, which revokes whichever registration held
//! the slot before; the previous popup then reads as closed and ignores
//! input routed to it.

use std::sync::{Arc, Mutex};

use tracing::debug;

#[derive(Debug, Default)]
struct Slot {
    next_generation: u64,
    active: Option<u64>,
}

/// Shared owner of the active-popup slot.
#[derive(Debug, Clone, Default)]
pub struct MenuCoordinator {
    slot: Arc<Mutex<Slot>>,
}

impl MenuCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a newly opened popup.
    pub fn register(&self) -> Registration {
        let generation = match self.slot.lock() {
            Ok(mut slot) => {
                slot.next_generation += 1;
                let generation = slot.next_generation;
                if let Some(previous) = slot.active.replace(generation) {
                    debug!(previous, generation, "popup slot taken over");
                }
                generation
            }
            Err(_) => 0,
        };
        Registration {
            generation,
            slot: Arc::clone(&self.slot),
        }
    }

    /// Generation of the registration holding the slot.
    pub fn active(&self) -> Option<u64> {
        self.slot.lock().ok().and_then(|slot| slot.active)
    }

    pub fn has_active(&self) -> bool {
        self.active().is_some()
    }

    /// Revoke whichever popup holds the slot.
    pub fn release(&self) -> bool {
        self.slot
            .lock()
            .map(|mut slot| slot.active.take().is_some())
            .unwrap_or(false)
    }
}

/// Revocable claim on the active-popup slot. Dropping it releases the slot
/// if it still holds it.
#[derive(Debug)]
pub struct Registration {
    generation: u64,
    slot: Arc<Mutex<Slot>>,
}

impl Registration {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.active == Some(self.generation))
            .unwrap_or(false)
    }

    /// Release the slot if this registration still holds it.
    pub fn revoke(&self) -> bool {
        self.slot
            .lock()
            .map(|mut slot| {
                if slot.active == Some(self.generation) {
                    slot.active = None;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.revoke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_registration_revokes_previous() {
        let coordinator = MenuCoordinator::new();
        let first = coordinator.register();
        assert!(first.is_active());

        let second = coordinator.register();
        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(coordinator.active(), Some(second.generation()));

        // A stale revoke must not release the new holder.
        assert!(!first.revoke());
        assert!(second.is_active());
    }

    #[test]
    fn test_drop_releases_slot() {
        let coordinator = MenuCoordinator::new();
        {
            let _reg = coordinator.register();
            assert!(coordinator.has_active());
        }
        assert!(!coordinator.has_active());
    }

    #[test]
    fn test_release_from_coordinator() {
        let coordinator = MenuCoordinator::new();
        let reg = coordinator.register();
        assert!(coordinator.release());
        assert!(!reg.is_active());
        assert!(!coordinator.release());
    }
}
