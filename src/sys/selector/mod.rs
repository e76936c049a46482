cfg_epoll_selector! {
    mod epoll;
    pub(crate) use self::epoll::{event, Event, Events, Selector};
}

cfg_poll_selector! {
    mod poll;
    pub(crate) use self::poll::{event, Event, Events, Selector};
}
