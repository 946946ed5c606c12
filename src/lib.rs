//! Mail Sweep: batch inbox classification with an auditable run log.

pub mod clock;
pub mod config;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod store;
