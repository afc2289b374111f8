//! # Creation Lock
//!
//! Gate on resource creation. Engaged before decorators run so that the
//! containment tree is frozen while measures are computed over it.

use crate::types::{Resource, StratumError};

/// Lock on resource creation.
///
/// Libraries are exempt: they may be discovered while decorating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreationLock {
    locked: bool,
    fail_when_locked: bool,
}

impl CreationLock {
    /// Create an unlocked lock. In strict mode (`fail_when_locked`),
    /// creation attempts while locked are errors; otherwise they are logged.
    #[must_use]
    pub const fn new(fail_when_locked: bool) -> Self {
        Self {
            locked: false,
            fail_when_locked,
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub const fn is_fail_when_locked(&self) -> bool {
        self.fail_when_locked
    }

    pub fn set_fail_when_locked(&mut self, fail_when_locked: bool) {
        self.fail_when_locked = fail_when_locked;
    }

    /// True when creating `resource` would be refused.
    #[must_use]
    pub fn blocks(&self, resource: &Resource) -> bool {
        self.locked && !resource.is_library()
    }

    /// Fail if creating `resource` is refused and the lock is strict.
    pub fn check(&self, resource: &Resource) -> Result<(), StratumError> {
        if self.blocks(resource) && self.fail_when_locked {
            return Err(StratumError::StructuralViolation(format!(
                "Index is locked, resource can not be indexed: {}",
                resource
            )));
        }
        Ok(())
    }
}
