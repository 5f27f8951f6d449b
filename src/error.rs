use std::fmt;
use std::io;

use thiserror::Error;

use crate::entry::EntryKind;

/// Which end of the temperature range was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Low,
    High,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Low => write!(f, "too low (min {})", crate::TEMP_MIN),
            Bound::High => write!(f, "too high (max {})", crate::TEMP_MAX),
        }
    }
}

/// The coded fields of a program that can fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    PowerLevel,
    TimerStart,
    AfterTimer,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldKind::PowerLevel => "power level",
            FieldKind::TimerStart => "timer start",
            FieldKind::AfterTimer => "after timer",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Entry was {0} bytes long, should have been {}", crate::ENTRY_LENGTH)]
    WrongLength(usize),

    #[error("Checksum does not match ({computed:02x} != {stored:02x})")]
    ChecksumMismatch { computed: u8, stored: u8 },

    #[error("Image was {0} bytes long, should have been {}", crate::IMAGE_LENGTH)]
    TruncatedImage(usize),

    #[error("Invalid {kind} {text}")]
    InvalidField { kind: FieldKind, text: String },

    #[error("{0}")]
    InvalidName(String),

    #[error("{kind} name {name} too long (max {max})")]
    NameTooLong {
        kind: EntryKind,
        name: String,
        max: usize,
    },

    #[error("Temperature {value} {bound}")]
    TemperatureOutOfRange { value: i64, bound: Bound },

    #[error("timer out of range ({hours}:{minutes:02}:{seconds:02})")]
    TimerOutOfRange {
        hours: i32,
        minutes: i32,
        seconds: i32,
    },

    #[error("Entry too long ({0})")]
    EntryTooLong(usize),

    #[error("Too many {0}s to fit in one file")]
    CapacityExceeded(EntryKind),

    #[error("Malformed line {line:?}: {reason}")]
    MalformedTextLine { line: String, reason: String },

    #[error("cannot take bytes from an image writer with an external sink")]
    NotAnInMemoryBuffer,

    #[error("image writer already finished")]
    WriterFinished,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Error::MalformedTextLine {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
