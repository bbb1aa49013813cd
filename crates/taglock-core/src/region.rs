//! Optional host hooks bracketing lock ownership.
//!
//! Some host environments want the executing thread marked
//! non-interruptible while it attempts or holds a spin lock, for example to
//! suppress preemption or aborts inside runtime critical regions. Such an
//! environment can install a process-wide hook pair; without one, every
//! bracketing call is a no-op costing a single atomic load.

use std::sync::OnceLock;

/// Host-supplied bracketing callbacks.
///
/// `enter` runs before every acquisition attempt. `exit` runs when an
/// attempt fails, errors, or times out, and again when the lock is
/// released, so the calls are balanced per thread under correct lock usage.
#[derive(Clone, Copy, Debug)]
pub struct RegionHooks {
    pub enter: fn(),
    pub exit: fn(),
}

static HOOKS: OnceLock<RegionHooks> = OnceLock::new();

/// Installs the process-wide hooks.
///
/// The first installation wins; returns `false` when hooks were already
/// installed.
pub fn install_region_hooks(hooks: RegionHooks) -> bool {
    HOOKS.set(hooks).is_ok()
}

#[inline(always)]
pub(crate) fn enter() {
    if let Some(hooks) = HOOKS.get() {
        (hooks.enter)();
    }
}

#[inline(always)]
pub(crate) fn exit() {
    if let Some(hooks) = HOOKS.get() {
        (hooks.exit)();
    }
}
