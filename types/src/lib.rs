pub mod audio;
pub mod events;

pub use events::{ClientEvent, ServerEvent};
