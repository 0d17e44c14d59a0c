//! Participant Discovery Protocol: the store of known participants and
//! endpoints, the announcement and lease engines, and the plumbing toward
//! the builtin endpoints, the EDP and the application listener.

pub mod announcer;
pub mod builtin;
pub mod config;
pub mod data_types;
pub mod discovery_info;
pub mod listener_dispatcher;
pub mod participant_proxy;
pub mod pdp;
pub mod proxy_pool;
pub mod receiver;
