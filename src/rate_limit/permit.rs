use std::fmt;

use tokio::sync::OwnedSemaphorePermit;

/// Outcome of an admission attempt.
///
/// A granted permit carries the obligation to give back whatever it holds. Release is tied to the
/// permit's lifetime: calling [`Permit::release`] or simply dropping the permit releases it exactly
/// once, which covers early returns and panics in the protected work. Ungranted permits hold
/// nothing.
#[must_use = "dropping a granted permit releases it immediately"]
pub struct Permit {
    state: State,
}

enum State {
    Denied,
    Granted(Release),
}

enum Release {
    Noop,
    Slot(#[allow(dead_code)] OwnedSemaphorePermit),
    Action(Box<dyn FnOnce() + Send>),
}

impl Permit {
    /// A rejection.
    pub fn denied() -> Self {
        Self { state: State::Denied }
    }

    /// A grant with nothing to give back (quota-style limiters).
    pub fn granted() -> Self {
        Self { state: State::Granted(Release::Noop) }
    }

    /// A grant that runs `release` once when the permit is released.
    pub fn granted_with<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { state: State::Granted(Release::Action(Box::new(release))) }
    }

    pub(crate) fn from_slot(slot: OwnedSemaphorePermit) -> Self {
        Self { state: State::Granted(Release::Slot(slot)) }
    }

    /// Whether admission was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self.state, State::Granted(_))
    }

    /// Release the permit now. Equivalent to dropping it.
    pub fn release(self) {
        drop(self)
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let State::Granted(Release::Action(action)) =
            std::mem::replace(&mut self.state, State::Denied)
        {
            action();
        }
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release = match &self.state {
            State::Denied => "none",
            State::Granted(Release::Noop) => "noop",
            State::Granted(Release::Slot(_)) => "slot",
            State::Granted(Release::Action(_)) => "action",
        };
        f.debug_struct("Permit")
            .field("granted", &self.is_granted())
            .field("release", &release)
            .finish()
    }
}
