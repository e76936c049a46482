cfg_epoll_selector! {
    mod eventfd;
    pub(crate) use self::eventfd::Waker;
}

cfg_poll_selector! {
    mod pipe;
    pub(crate) use self::pipe::Waker;
}
