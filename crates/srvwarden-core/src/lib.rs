#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod buffer;
pub mod domain;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use buffer::{
    BookmarkId, BufferError, BufferId, BufferOptions, BufferRegistry, BufferStatus, Cursor,
    DEFAULT_CAPACITY, LineFilter, MAX_BOOKMARKS, ReadOutcome, StreamBuffer, strip_ansi,
    trim_trailing_whitespace,
};
pub use domain::{
    MonitorPhase, MonitorSnapshot, PlayerRecord, PlayerRoster, QueryPlayer, QuerySnapshot,
    ServerInfo, format_clock, is_steam_id,
};
pub use paths::{DATA_DIR_ENV, PathError, config_path, data_root, pids_dir};
pub use ports::{CheckError, QueryCheck, RconCheck, RestartRequester};
pub use settings::{
    DEFAULT_GAME_PORT, DEFAULT_QUERY_PORT, DEFAULT_RCON_PORT, MonitorSettings, ServerSettings,
    SettingsError, SteamCmdSettings, validate_settings,
};
