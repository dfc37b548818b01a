//! The Hook bus (`spec.md` §4.5): per-module lifecycle listeners. Cancel
//! propagation itself is wired through [`crate::cancel::CancelScope`] inside
//! a Function's own `run` (see that module's docs for why); the bus here
//! covers the other half of a Hook's job — `startup`/`pipeline_update`/
//! `shutdown` notifications, and an optional HTTP sub-application the
//! external transport mounts under `/hooks/<package>`.

use std::sync::Arc;

/// A per-module lifecycle listener. The core manipulates every Hook
/// uniformly through this trait; it never interprets a Hook's sub-app.
pub trait Hook: Send + Sync {
    /// Fired once at module registration.
    fn on_startup(&self) {}

    /// Fired after every successful import.
    fn on_pipeline_update(&self) {}

    /// Fired at teardown.
    fn on_shutdown(&self) {}

    /// Mount path for this Hook's optional HTTP sub-application, if any.
    /// The core does not interpret what's served there.
    fn mount_path(&self) -> Option<&'static str> {
        None
    }
}

/// Holds every registered Hook and fires lifecycle events on all of them.
#[derive(Default)]
pub struct HookBus {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        hook.on_startup();
        self.hooks.push(hook);
    }

    pub fn fire_pipeline_update(&self) {
        for hook in &self.hooks {
            hook.on_pipeline_update();
        }
    }

    /// Invoked on shutdown; order is unspecified, matching the source's
    /// `Manager.shutdown` (which iterates a plain dict of hooks).
    pub fn fire_shutdown(&self) {
        for hook in &self.hooks {
            hook.on_shutdown();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Hook>> {
        self.hooks.iter()
    }
}
