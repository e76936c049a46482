use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::time::Duration;

use libc::{EPOLLIN, EPOLLONESHOT, EPOLLOUT, EPOLLPRI, EPOLLRDHUP};

use crate::poll::Interest;
use crate::sys::waker::Waker;

/// Token of the waker, never handed out to a registration.
const WAKE_TOKEN: u64 = u64::MAX;

#[derive(Debug)]
pub(crate) struct Selector {
    ep: OwnedFd,
    waker: Waker,
}

impl Selector {
    pub(crate) fn new() -> io::Result<Selector> {
        // SAFETY: `epoll_create1(2)` ensures the fd is valid.
        let ep = unsafe { OwnedFd::from_raw_fd(syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?) };
        let waker = Waker::new()?;
        // Level-triggered and never disarmed, `select` resets it.
        let mut event = libc::epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };
        syscall!(epoll_ctl(
            ep.as_raw_fd(),
            libc::EPOLL_CTL_ADD,
            waker.as_raw_fd(),
            &mut event
        ))?;
        Ok(Selector { ep, waker })
    }

    pub(crate) fn select(&self, events: &mut Events, timeout: Option<Duration>) -> io::Result<()> {
        let timeout = timeout
            .map(|to| {
                // `Duration::as_millis` truncates, so round up. This avoids
                // turning sub-millisecond timeouts into a zero timeout, unless
                // the caller explicitly requests that by specifying a zero
                // timeout.
                to.checked_add(Duration::from_nanos(999_999))
                    .unwrap_or(to)
                    .as_millis()
                    .min(libc::c_int::MAX as u128) as libc::c_int
            })
            .unwrap_or(-1);

        events.clear();
        let n_events = syscall!(epoll_wait(
            self.ep.as_raw_fd(),
            events.as_mut_ptr(),
            events.capacity() as i32,
            timeout,
        ))?;
        // This is safe because `epoll_wait` ensures that `n_events` are
        // assigned.
        unsafe { events.set_len(n_events as usize) };

        let waker = &self.waker;
        events.retain(|event| {
            if event.u64 == WAKE_TOKEN {
                waker.ack_and_reset();
                false
            } else {
                true
            }
        });
        Ok(())
    }

    /// Registers `fd`, armed for a single event.
    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_ADD, fd, token, interest)
    }

    /// Re-arms `fd` with `interest`.
    pub(crate) fn reregister(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        self.ctl(libc::EPOLL_CTL_MOD, fd, token, interest)
    }

    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let ep = self.ep.as_raw_fd();
        syscall!(epoll_ctl(ep, libc::EPOLL_CTL_DEL, fd, ptr::null_mut())).map(|_| ())
    }

    pub(crate) fn wake(&self) -> io::Result<()> {
        self.waker.wake()
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        debug_assert!(token != WAKE_TOKEN);
        let mut event = libc::epoll_event {
            events: interest_to_epoll(interest),
            u64: token,
        };
        let ep = self.ep.as_raw_fd();
        syscall!(epoll_ctl(ep, op, fd, &mut event)).map(|_| ())
    }
}

impl AsRawFd for Selector {
    fn as_raw_fd(&self) -> RawFd {
        self.ep.as_raw_fd()
    }
}

fn interest_to_epoll(interest: Interest) -> u32 {
    let mut kind = EPOLLONESHOT;

    if interest.is_readable() {
        kind = kind | EPOLLIN | EPOLLRDHUP;
    }

    if interest.is_writable() {
        kind |= EPOLLOUT;
    }

    if interest.is_priority() {
        kind |= EPOLLPRI;
    }

    kind as u32
}

pub(crate) type Event = libc::epoll_event;
pub(crate) type Events = Vec<Event>;

pub(crate) mod event {
    use std::fmt;

    use crate::poll::Readiness;
    use crate::sys::Event;

    pub(crate) fn token(event: &Event) -> u64 {
        event.u64
    }

    pub(crate) fn readiness(event: &Event) -> Readiness {
        let events = event.events as libc::c_int;
        let mut readiness = Readiness::empty();
        if events & libc::EPOLLIN != 0 {
            readiness |= Readiness::READABLE;
        }
        if events & libc::EPOLLPRI != 0 {
            readiness |= Readiness::PRIORITY;
        }
        if events & libc::EPOLLOUT != 0 {
            readiness |= Readiness::WRITABLE;
        }
        if events & libc::EPOLLERR != 0 {
            readiness |= Readiness::ERROR;
        }
        // Both halves closed, or the peer shut down its writing half.
        if events & (libc::EPOLLHUP | libc::EPOLLRDHUP) != 0 {
            readiness |= Readiness::HUP;
        }
        readiness
    }

    pub(crate) fn debug_details(f: &mut fmt::Formatter<'_>, event: &Event) -> fmt::Result {
        #[allow(clippy::trivially_copy_pass_by_ref)]
        fn check_events(got: &u32, want: &libc::c_int) -> bool {
            (*got as libc::c_int & want) != 0
        }
        debug_detail!(
            EventsDetails(u32),
            check_events,
            libc::EPOLLIN,
            libc::EPOLLPRI,
            libc::EPOLLOUT,
            libc::EPOLLERR,
            libc::EPOLLHUP,
            libc::EPOLLRDHUP,
        );

        // Can't reference fields in packed structures.
        let e_u64 = event.u64;
        f.debug_struct("epoll_event")
            .field("events", &EventsDetails(event.events))
            .field("u64", &e_u64)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::interest_to_epoll;
    use crate::poll::Interest;

    #[test]
    fn registrations_are_one_shot() {
        let kind = interest_to_epoll(Interest::READABLE) as libc::c_int;
        assert_ne!(kind & libc::EPOLLONESHOT, 0);
        assert_ne!(kind & libc::EPOLLIN, 0);
        assert_eq!(kind & libc::EPOLLOUT, 0);
        assert_eq!(kind & libc::EPOLLET, 0);
    }
}
