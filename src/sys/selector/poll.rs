use std::collections::HashMap;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use libc::{c_short, nfds_t, POLLIN, POLLOUT, POLLPRI};

use crate::poll::Interest;
use crate::sys::waker::Waker;

/// `poll(2)` based selector.
///
/// `poll(2)` keeps no state in the kernel, so the registrations live in
/// `entries` and every call to `select` polls a snapshot of the armed ones.
/// Changes made while a `select` call is blocked wake it up, so that it picks
/// up a new snapshot.
#[derive(Debug)]
pub(crate) struct Selector {
    state: Mutex<State>,
    waker: Waker,
    /// Set by `wake`, tells a blocked `select` to return.
    woken: AtomicBool,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<RawFd, Entry>,
    next_arm: u64,
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    token: u64,
    events: c_short,
    armed: bool,
    /// Changes every time the entry is (re)armed. An event from a snapshot is
    /// only delivered if the entry hasn't been rearmed since.
    arm: u64,
}

impl Selector {
    pub(crate) fn new() -> io::Result<Selector> {
        Ok(Selector {
            state: Mutex::new(State::default()),
            waker: Waker::new()?,
            woken: AtomicBool::new(false),
        })
    }

    pub(crate) fn select(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        let deadline = timeout.and_then(|to| Instant::now().checked_add(to));
        events.clear();

        loop {
            let mut fds = vec![libc::pollfd {
                fd: self.waker.as_raw_fd(),
                events: POLLIN,
                revents: 0,
            }];
            let mut snapshot = Vec::new();
            for (&fd, entry) in self.lock().entries.iter() {
                if entry.armed {
                    fds.push(libc::pollfd {
                        fd,
                        events: entry.events,
                        revents: 0,
                    });
                    snapshot.push((entry.token, entry.arm));
                }
            }

            let timeout = match (timeout, deadline) {
                (Some(_), Some(deadline)) => {
                    to_millis(deadline.saturating_duration_since(Instant::now()))
                }
                // Overflowed `Instant`, block.
                (Some(_), None) | (None, _) => -1,
            };
            let n = syscall!(poll(fds.as_mut_ptr(), fds.len() as nfds_t, timeout))?;

            if fds[0].revents != 0 {
                self.waker.ack_and_reset();
            }

            if n > 0 {
                let mut state = self.lock();
                for (pollfd, (token, arm)) in fds[1..].iter().zip(snapshot) {
                    if pollfd.revents == 0 || events.len() == events.capacity() {
                        continue;
                    }
                    if let Some(entry) = state.entries.get_mut(&pollfd.fd) {
                        // Skip entries rearmed or replaced while we polled.
                        if entry.armed && entry.arm == arm {
                            entry.armed = false;
                            events.push(Event {
                                token,
                                revents: pollfd.revents,
                            });
                        }
                    }
                }
            }

            let woken = self.woken.swap(false, Ordering::AcqRel);
            if !events.is_empty() || woken {
                return Ok(());
            }
            if matches!(deadline, Some(deadline) if Instant::now() >= deadline) {
                return Ok(());
            }
        }
    }

    /// Registers `fd`, armed for a single event.
    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        {
            let mut state = self.lock();
            if state.entries.contains_key(&fd) {
                return Err(io::Error::from_raw_os_error(libc::EEXIST));
            }
            let arm = state.next_arm();
            state.entries.insert(
                fd,
                Entry {
                    token,
                    events: interest_to_poll(interest),
                    armed: true,
                    arm,
                },
            );
        }
        self.waker.wake()
    }

    /// Re-arms `fd` with `interest`.
    pub(crate) fn reregister(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        {
            let mut state = self.lock();
            let arm = state.next_arm();
            let entry = state
                .entries
                .get_mut(&fd)
                .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;
            entry.token = token;
            entry.events = interest_to_poll(interest);
            entry.armed = true;
            entry.arm = arm;
        }
        self.waker.wake()
    }

    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        match self.lock().entries.remove(&fd) {
            // A blocked `select` may still poll the descriptor, but it won't
            // find an entry to deliver the event to.
            Some(_) => Ok(()),
            None => Err(io::Error::from_raw_os_error(libc::ENOENT)),
        }
    }

    pub(crate) fn wake(&self) -> io::Result<()> {
        self.woken.store(true, Ordering::Release);
        self.waker.wake()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The state is valid after any panic, none of the updates can be
        // observed half done.
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl State {
    fn next_arm(&mut self) -> u64 {
        self.next_arm = self.next_arm.wrapping_add(1);
        self.next_arm
    }
}

impl AsRawFd for Selector {
    fn as_raw_fd(&self) -> RawFd {
        self.waker.as_raw_fd()
    }
}

fn to_millis(to: Duration) -> libc::c_int {
    // Round up, see the epoll selector.
    to.checked_add(Duration::from_nanos(999_999))
        .unwrap_or(to)
        .as_millis()
        .min(libc::c_int::MAX as u128) as libc::c_int
}

fn interest_to_poll(interest: Interest) -> c_short {
    let mut kind = 0;

    if interest.is_readable() {
        kind |= POLLIN;
    }
    if interest.is_priority() {
        kind |= POLLPRI;
    }
    if interest.is_writable() {
        kind |= POLLOUT;
    }
    kind
}

#[derive(Debug)]
pub(crate) struct Event {
    token: u64,
    revents: c_short,
}

pub(crate) type Events = Vec<Event>;

pub(crate) mod event {
    use std::fmt;

    use libc::c_short;

    use crate::poll::Readiness;
    use crate::sys::Event;

    pub(crate) fn token(event: &Event) -> u64 {
        event.token
    }

    pub(crate) fn readiness(event: &Event) -> Readiness {
        let revents = event.revents;
        let mut readiness = Readiness::empty();
        if revents & libc::POLLIN != 0 {
            readiness |= Readiness::READABLE;
        }
        if revents & libc::POLLPRI != 0 {
            readiness |= Readiness::PRIORITY;
        }
        if revents & libc::POLLOUT != 0 {
            readiness |= Readiness::WRITABLE;
        }
        if revents & libc::POLLERR != 0 {
            readiness |= Readiness::ERROR;
        }
        if revents & libc::POLLHUP != 0 {
            readiness |= Readiness::HUP;
        }
        if revents & libc::POLLNVAL != 0 {
            readiness |= Readiness::INVALID;
        }
        readiness
    }

    pub(crate) fn debug_details(f: &mut fmt::Formatter<'_>, event: &Event) -> fmt::Result {
        #[allow(clippy::trivially_copy_pass_by_ref)]
        fn check_flag(got: &c_short, want: &c_short) -> bool {
            (got & want) != 0
        }

        debug_detail!(
            FlagsDetails(c_short),
            check_flag,
            libc::POLLIN,
            libc::POLLPRI,
            libc::POLLOUT,
            libc::POLLERR,
            libc::POLLHUP,
            libc::POLLNVAL,
        );

        f.debug_struct("pollfd")
            .field("revents", &FlagsDetails(event.revents))
            .field("token", &event.token)
            .finish()
    }
}
