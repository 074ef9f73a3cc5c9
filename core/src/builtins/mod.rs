//! Build commands handled in-process instead of by spawning a program.

pub mod download;
pub mod files;

pub use download::{DownloadOutcome, Downloader};
pub use files::{clean, copy, make_dir};

pub const CLEAN: &str = "clean:";
pub const MKDIR: &str = "mkdir:";
pub const COPY: &str = "copy:";
pub const HTTP: &str = "http";
