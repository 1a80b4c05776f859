pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod document;
pub mod editor;
pub mod journaling;
pub mod storage;
pub mod ui;

pub use cache::{CacheSlot, EntryFields, EntrySnapshot, LocalCacheStore};
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
