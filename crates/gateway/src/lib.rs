//! HTTP ingress for the Shelf bot: archive-channel intake, the private-chat
//! browse flow and the delivery outbox connectors drain.

pub mod api;
pub mod bootstrap;
pub mod catalog;
pub mod cli;
pub mod outbox;
pub mod runtime;
pub mod state;
