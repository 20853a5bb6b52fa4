//! Random media spawner
//!
//! Spawns randomly chosen media files from a folder into a host scene,
//! optionally with a random placement, and removes them again when their
//! playback ends. The host is reached only through the [`host::Host`]
//! trait; remote requests arrive through [`remote::VendorApi`].

pub mod config;
pub mod host;
pub mod logging;
pub mod media;
pub mod remote;
pub mod source;
pub mod spawn;
pub mod watch;
