//! git identity and credential-helper configuration

pub mod helper;
pub mod identity;
