//! Torrent client abstraction.
//!
//! This module provides a `TorrentClient` trait covering the bulk operations the
//! reconciliation engine issues, with a qBittorrent Web API implementation.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
