mod handler;
pub mod protocol;
pub mod relay;

pub use handler::router;
pub(crate) use handler::MAX_FRAME_BYTES;
pub use relay::{RelayStats, SignalRelay};
