// Takeout Sync - Library Entry Point

pub mod archive;
pub mod banned;
pub mod cancel;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod filenames;
pub mod groups;
pub mod media;
pub mod takeout;
pub mod workers;

pub use cancel::CancelToken;
pub use config::ImportOptions;
pub use error::{Result, TakeoutError};
pub use events::{EventCode, Recorder, Report};
pub use groups::{AssetGroup, Grouping};
pub use takeout::{EmittedAsset, TakeoutEngine};
