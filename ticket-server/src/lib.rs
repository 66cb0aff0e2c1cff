//! A multi-client support ticketing service.
//!
//! Clients identify as a user or a technician over a line based protocol,
//! then create, list, claim and close tickets held in a small shared store.

pub mod command;
pub mod connection;
pub mod scheduler;
pub mod session;
pub mod tickets;
