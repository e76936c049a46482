use std::os::fd::RawFd;

use super::{Interest, Readiness};

/// A readiness event, passed to the callback of a registration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub(super) fd: RawFd,
    pub(super) interest: Interest,
    pub(super) readiness: Readiness,
}

impl Event {
    /// Returns the descriptor the event is for.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Returns the interest of the registration at the time the event was
    /// delivered.
    ///
    /// This reflects any [`Bridge::update`] made before delivery, including
    /// one made after the host reported the readiness.
    ///
    /// [`Bridge::update`]: crate::Bridge::update
    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Returns the readiness observed by the host.
    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn is_readable(&self) -> bool {
        self.readiness.is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.readiness.is_writable()
    }

    pub fn is_error(&self) -> bool {
        self.readiness.is_error()
    }

    pub fn is_hup(&self) -> bool {
        self.readiness.is_hup()
    }
}
