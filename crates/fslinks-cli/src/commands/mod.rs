//! Command handlers

pub mod config;
pub mod link;
pub mod status;
pub mod tag;
pub mod transfer;
