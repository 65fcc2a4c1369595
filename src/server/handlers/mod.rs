//! HTTP handlers

pub mod health;
pub mod mount;
pub mod proxy;
pub mod search;
pub mod tunnel;
