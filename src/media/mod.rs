//! Media session ownership.
//!
//! - [`MediaPlatform`]: adapter trait over the platform media-session surface
//! - [`SessionController`]: claim / refresh / teardown state machine driver
//! - [`HeadlessPlatform`]: adapter for hosts without a system media session

mod controller;
mod headless;
mod platform;

pub use controller::SessionController;
pub use headless::HeadlessPlatform;
pub use platform::{FocusChange, MediaPlatform, PlatformError, TransportSnapshot};
