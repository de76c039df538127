mod client;

pub use convai_realtime_types as types;
pub use client::{connect, connect_with_config, Client, Config, ConfigBuilder, ServerRx};

#[cfg(feature = "utils")]
pub use convai_realtime_utils as utils;
