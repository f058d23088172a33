//! Serde helpers shared by the persisted types

pub mod bytes;
pub mod datetime;
