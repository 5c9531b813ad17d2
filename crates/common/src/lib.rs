// consult-common: shared types and wire protocol for the consult relay

pub mod protocol;
pub mod types;
