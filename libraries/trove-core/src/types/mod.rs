mod events;
mod media_item;
mod tags;

pub use events::{ScanEvent, ScanProgress, WalkerStats};
pub use media_item::{Fingerprint, MediaItem};
pub use tags::{is_supported_audio, TagFields, SUPPORTED_EXTENSIONS};
