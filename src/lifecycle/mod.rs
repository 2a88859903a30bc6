pub mod countdown;
pub mod poller;
pub mod session;
pub mod state;
