//! Readiness bridge.
//!
//! A [`Bridge`] lets the host's readiness notification drive callbacks.
//! Descriptors are registered with an [`Interest`] and a callback, and
//! [`Bridge::dispatch`] waits for the host and delivers [`Event`]s.
//!
//! # Registrations are one-shot
//!
//! After a callback is delivered its descriptor is disarmed. No further
//! callbacks are delivered for it until [`Bridge::update`] re-arms it. A
//! callback that wants to keep receiving events calls `update` itself,
//! typically after draining the descriptor.
//!
//! # Removal
//!
//! Once [`Bridge::remove`] returns, the callback of the descriptor will not
//! run again, even if [`Bridge::dispatch`] is running on another thread. If
//! the callback is running at the time `remove` blocks until it returns. The
//! one exception is a callback removing its own registration: that doesn't
//! block and the callback is dropped once it returns.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), midsock::Error> {
//! use std::time::Duration;
//!
//! use midsock::{Bridge, Interest};
//!
//! let mut fds = [-1; 2];
//! assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
//!
//! let bridge = Bridge::new()?;
//! bridge.add(fds[1], Interest::WRITABLE, |event| {
//!     assert!(event.is_writable());
//! })?;
//!
//! let n = bridge.dispatch(Some(Duration::from_secs(1)))?;
//! assert_eq!(n, 1);
//!
//! bridge.remove(fds[1])?;
//! # unsafe { libc::close(fds[0]); libc::close(fds[1]); }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;
use std::{cmp, fmt};

use log::{debug, trace};

use crate::error::{RegistrationError, Result};
use crate::sys;

mod event;
mod interest;

pub use self::event::Event;
pub use self::interest::{Interest, Readiness};

/// Callback of a registration.
pub type Callback = Box<dyn FnMut(&Event) + Send>;

/// Number of host events collected by a single `dispatch` call by default.
const DEFAULT_CAPACITY: usize = 256;

/// Bridge between the host readiness notification and registration callbacks.
///
/// `Bridge` is `Send` and `Sync`. Registrations can be changed from any
/// thread, including from inside a callback. [`dispatch`] can be called from
/// several threads at once. The callback of a descriptor never runs on two
/// threads at the same time: readiness reported while it runs is delivered
/// by the thread running it, once it returns.
///
/// [`dispatch`]: Bridge::dispatch
pub struct Bridge {
    selector: sys::Selector,
    registrations: Mutex<HashMap<RawFd, Arc<Registration>>>,
    events: Mutex<sys::Events>,
    next_seq: AtomicU32,
}

struct Registration {
    fd: RawFd,
    /// Token passed to the host, `(seq << 32) | fd`. Events carrying another
    /// token are from an older registration of the same descriptor.
    token: u64,
    state: Mutex<State>,
    /// Signalled when a callback returns.
    idle: Condvar,
}

struct State {
    interest: Interest,
    /// `None` while the callback is running.
    callback: Option<Callback>,
    /// The thread running the callback.
    running: Option<ThreadId>,
    /// Readiness reported while the callback ran on another thread.
    pending: Option<Readiness>,
    removed: bool,
}

impl Bridge {
    /// Creates a new bridge.
    pub fn new() -> Result<Bridge> {
        Bridge::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new bridge that collects at most `capacity` host events in a
    /// single [`dispatch`] call.
    ///
    /// [`dispatch`]: Bridge::dispatch
    pub fn with_capacity(capacity: usize) -> Result<Bridge> {
        Ok(Bridge {
            selector: sys::Selector::new()?,
            registrations: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::with_capacity(cmp::max(capacity, 1))),
            next_seq: AtomicU32::new(0),
        })
    }

    /// Registers `fd`, armed for `interest`.
    ///
    /// # Errors
    ///
    /// If `fd` is already registered this returns
    /// [`RegistrationError::AlreadyRegistered`], without calling the host.
    pub fn add<F>(&self, fd: RawFd, interest: Interest, callback: F) -> Result<()>
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let mut registrations = lock(&self.registrations);
        if registrations.contains_key(&fd) {
            return Err(RegistrationError::AlreadyRegistered(fd).into());
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let token = (u64::from(seq) << 32) | u64::from(fd as u32);
        trace!(
            "registering descriptor; fd={}, token={:#x}, interest={:?}",
            fd,
            token,
            interest
        );
        self.selector.register(fd, token, interest)?;

        let registration = Registration {
            fd,
            token,
            state: Mutex::new(State {
                interest,
                callback: Some(Box::new(callback)),
                running: None,
                pending: None,
                removed: false,
            }),
            idle: Condvar::new(),
        };
        registrations.insert(fd, Arc::new(registration));
        Ok(())
    }

    /// Changes the interest of `fd` and re-arms it.
    ///
    /// A callback delivered after this call sees the new interest, even if
    /// the host reported the readiness before.
    ///
    /// # Errors
    ///
    /// If `fd` isn't registered this returns
    /// [`RegistrationError::NotRegistered`], without calling the host.
    pub fn update(&self, fd: RawFd, interest: Interest) -> Result<()> {
        let registrations = lock(&self.registrations);
        let registration = registrations
            .get(&fd)
            .ok_or(RegistrationError::NotRegistered(fd))?;

        trace!(
            "reregistering descriptor; fd={}, token={:#x}, interest={:?}",
            fd,
            registration.token,
            interest
        );
        registration.lock().interest = interest;
        self.selector
            .reregister(fd, registration.token, interest)
            .map_err(Into::into)
    }

    /// Removes the registration of `fd`.
    ///
    /// Once this returns the callback of `fd` won't run again. See the
    /// [module documentation] for the details.
    ///
    /// # Errors
    ///
    /// If `fd` isn't registered this returns
    /// [`RegistrationError::NotRegistered`], without calling the host. A host
    /// error is returned after the registration is removed.
    ///
    /// [module documentation]: crate::poll#removal
    pub fn remove(&self, fd: RawFd) -> Result<()> {
        let (registration, res) = {
            let mut registrations = lock(&self.registrations);
            let registration = registrations
                .remove(&fd)
                .ok_or(RegistrationError::NotRegistered(fd))?;
            trace!(
                "deregistering descriptor; fd={}, token={:#x}",
                fd,
                registration.token
            );
            let res = match self.selector.deregister(fd) {
                // Closing a descriptor removes it from the host set.
                Err(ref err)
                    if matches!(err.raw_os_error(), Some(libc::EBADF) | Some(libc::ENOENT)) =>
                {
                    debug!("descriptor closed before deregistering; fd={}", fd);
                    Ok(())
                }
                res => res,
            };
            (registration, res)
        };

        let callback = {
            let mut state = registration.lock();
            state.removed = true;
            let callback = state.callback.take();
            let current = thread::current().id();
            while matches!(state.running, Some(id) if id != current) {
                state = registration
                    .idle
                    .wait(state)
                    .unwrap_or_else(|err| err.into_inner());
            }
            callback
        };
        // Dropped outside of the lock.
        drop(callback);
        res.map_err(Into::into)
    }

    /// Waits for readiness and delivers the callbacks.
    ///
    /// Blocks until at least one event is available, `timeout` elapses or
    /// [`wake`] is called. Returns the number of callbacks invoked.
    ///
    /// [`wake`]: Bridge::wake
    pub fn dispatch(&self, timeout: Option<Duration>) -> Result<usize> {
        let ready: Vec<(u64, Readiness)> = {
            let mut events = lock(&self.events);
            self.selector.select(&mut events, timeout)?;
            events
                .iter()
                .map(|event| {
                    trace!("host event: {:?}", HostEvent(event));
                    (sys::event::token(event), sys::event::readiness(event))
                })
                .collect()
        };

        let mut n = 0;
        for (token, readiness) in ready {
            let fd = token as u32 as RawFd;
            let registration = match lock(&self.registrations).get(&fd) {
                Some(registration) if registration.token == token => Arc::clone(registration),
                _ => {
                    trace!("dropping stale event; fd={}, token={:#x}", fd, token);
                    continue;
                }
            };
            n += registration.run(readiness);
        }
        trace!("dispatched {} callbacks", n);
        Ok(n)
    }

    /// Wakes up a blocked [`dispatch`] call.
    ///
    /// If no call is blocked the next one returns immediately.
    ///
    /// [`dispatch`]: Bridge::dispatch
    pub fn wake(&self) -> Result<()> {
        self.selector.wake().map_err(Into::into)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("selector", &self.selector)
            .field("registrations", &lock(&self.registrations).len())
            .finish()
    }
}

impl Registration {
    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Runs the callback, returns the number of times it ran.
    ///
    /// If the callback is running on another thread the readiness is left
    /// for that thread, which delivers it once the callback returns. The
    /// host registration is disarmed at this point, dropping the event would
    /// lose the re-arm that caused it.
    fn run(&self, mut readiness: Readiness) -> usize {
        let mut n = 0;
        loop {
            let (mut running, interest) = {
                let mut state = self.lock();
                if state.removed {
                    return n;
                }
                match state.callback.take() {
                    Some(callback) => {
                        state.running = Some(thread::current().id());
                        let running = Running {
                            registration: self,
                            callback: Some(callback),
                        };
                        (running, state.interest)
                    }
                    None => {
                        trace!(
                            "callback running, leaving event; fd={}, readiness={:?}",
                            self.fd,
                            readiness
                        );
                        state.pending = Some(match state.pending {
                            Some(pending) => pending | readiness,
                            None => readiness,
                        });
                        return n;
                    }
                }
            };

            let event = Event {
                fd: self.fd,
                interest,
                readiness,
            };
            trace!("delivering event: {:?}", event);
            running.call(&event);
            n += 1;

            match running.finish() {
                Some(pending) => readiness = pending,
                None => return n,
            }
        }
    }
}

/// A callback taken out of its registration to run.
///
/// Puts the callback back and wakes up `remove` callers when dropped, also
/// when the callback panics.
struct Running<'a> {
    registration: &'a Registration,
    callback: Option<Callback>,
}

impl Running<'_> {
    fn call(&mut self, event: &Event) {
        if let Some(callback) = self.callback.as_mut() {
            callback(event);
        }
    }

    /// Returns the readiness left by other threads while the callback ran.
    fn finish(mut self) -> Option<Readiness> {
        self.release()
    }

    fn release(&mut self) -> Option<Readiness> {
        let mut state = self.registration.lock();
        state.running = None;
        let pending = state.pending.take();
        let (removed, pending) = if state.removed {
            (self.callback.take(), None)
        } else {
            state.callback = self.callback.take();
            (None, pending)
        };
        drop(state);
        self.registration.idle.notify_all();
        // Removed from within the callback, or while it ran.
        drop(removed);
        pending
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        if self.callback.is_some() {
            let _ = self.release();
        }
    }
}

/// Locks `mutex`, ignoring poisoning.
///
/// All updates under the locks of this module are single assignments, so the
/// data is consistent after a panic.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

struct HostEvent<'a>(&'a sys::Event);

impl fmt::Debug for HostEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        sys::event::debug_details(f, self.0)
    }
}
