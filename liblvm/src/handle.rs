//! Mutex-serialized access to the volume manager.
//!
//! [`LvmHandle`] owns the process-wide lock around the non-reentrant native
//! library and exposes only scoped acquisition: callers hand over a closure
//! and the handle guarantees the volume group is closed again on every exit
//! path, including early returns and panics inside the closure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::LvmError;
use crate::manager::{GroupId, OpenMode, VolumeManager};

/// Shared, serialized handle to a [`VolumeManager`].
///
/// Cloning is cheap; all clones funnel through the same mutex, so two
/// concurrent callers never execute native calls at the same time.  The lock
/// is held for the span of one `with_*` call only, never across unrelated
/// work such as request validation.
#[derive(Clone)]
pub struct LvmHandle {
    inner: Arc<Mutex<Box<dyn VolumeManager>>>,
}

impl LvmHandle {
    pub fn new(manager: impl VolumeManager + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(manager))),
        }
    }

    /// Run `f` with exclusive access to the volume manager, without opening
    /// any group.  Used for group-less operations such as device scans and
    /// physical-volume management.
    pub fn with_manager<R, E>(
        &self,
        f: impl FnOnce(&mut dyn VolumeManager) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<LvmError>,
    {
        let mut guard = self.lock();
        f(&mut **guard)
    }

    /// Open the volume group `name`, run `f`, and close the group again.
    ///
    /// The close happens on every exit path.  A panic inside `f` is caught,
    /// the group is closed, and the panic is resumed; a close failure is an
    /// engine bug (the open succeeded, so the handle must be closable) and
    /// aborts loudly instead of surfacing as a recoverable error.
    pub fn with_group<R, E>(
        &self,
        name: &str,
        mode: OpenMode,
        f: impl FnOnce(&mut dyn VolumeManager, GroupId) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<LvmError>,
    {
        let mut guard = self.lock();

        let group = guard.open_group(name, mode)?;
        debug!(group = name, ?mode, "volume group opened");

        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&mut **guard, group)));

        if let Err(e) = guard.close_group(group) {
            // Balanced open/close is guaranteed by this function; a failing
            // close means the invariant is broken.
            panic!("unbalanced volume group close for {name}: {e}");
        }
        debug!(group = name, "volume group closed");

        match result {
            Ok(r) => r,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Box<dyn VolumeManager>> {
        // A poisoning panic can only originate in `with_group`, which closes
        // the open group before resuming the unwind, so the manager state is
        // consistent and the lock can be taken over.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
