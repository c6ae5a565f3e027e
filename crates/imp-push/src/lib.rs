// imp-push: Push dispatcher for the messaging server.
//
// Takes a ready message plus its recipient set from the transfer stage and
// delivers it through two channels: live gateway fan-out for connected
// clients, third-party mobile push for everyone else.

pub mod callback;
pub mod clients;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod offlinepush;
pub mod onlinepush;
pub mod payload;
pub mod pusher;

pub use error::PushError;
pub use pusher::Pusher;
