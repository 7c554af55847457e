//! Session lifecycle
//!
//! The controller is the host-facing surface; context, keepalive, and
//! reconnect are its internals. A session is always a pair (transport +
//! synthesis) plus at most one armed keepalive timer, replaced as a unit.

mod context;
mod controller;
mod keepalive;
mod reconnect;

pub use controller::{AvatarSessionController, SessionEvent};
