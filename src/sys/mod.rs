//! Host readiness notification.
//!
//! Linux and Android use `epoll(7)` with an `eventfd` waker, other Unix hosts
//! use `poll(2)` with a pipe waker. Setting the `midsock_force_poll_poll` cfg
//! selects `poll(2)` everywhere.
//!
//! Registrations are one-shot: once an event for a descriptor is returned the
//! descriptor is disarmed until it's re-registered.

mod selector;
mod waker;

pub(crate) use self::selector::{event, Event, Events, Selector};
