//! Wire types shared by the report client and the reporting service.

pub mod domain;
pub mod error;
pub mod protocol;
