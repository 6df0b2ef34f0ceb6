pub mod bridge_state;
pub mod shared_view;

pub use bridge_state::{BridgeState, DeviceCursor, PlaybackModel, SessionOwnership};
pub use shared_view::{BridgeSnapshot, SharedBridgeView};
