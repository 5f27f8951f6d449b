//! Reading, writing and merging program and alarm files for the Breville
//! Control Freak induction cooker.
//!
//! Programs and alarms travel in an 8K binary image (`.FA1`) or as lines of
//! `|` separated text. Both can be merged into one duplicate-free
//! [`Collection`].

pub mod alarm;
pub mod entry;
pub mod error;
pub mod fields;
pub mod image;
pub mod merge;
pub mod program;
pub mod record;
pub mod utils;

pub use alarm::Alarm;
pub use entry::{ENTRY_LENGTH, Entry, EntryKind, checksum};
pub use error::{Error, Result};
pub use fields::{AfterTimer, PowerLevel, Timer, TimerStart};
pub use image::{IMAGE_LENGTH, ImageReader, ImageWriter};
pub use merge::{Collection, LogReporter, MAX_ENTRIES, Reporter};
pub use program::Program;
pub use record::{EntryRecord, Record};
pub use utils::{diff_blocks, diff_files, hex_dump_file};

/// Lowest supported temperature in °F.
pub const TEMP_MIN: u16 = 0;

/// Highest supported temperature in °F.
pub const TEMP_MAX: u16 = 482;

/// Temperatures above this are stored as an offset from it.
pub const TEMP_MOD: u16 = 255;
