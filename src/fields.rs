//! Coded program fields: power level, timer start, after timer and the cook timer.
//!
//! Each enum has a wire code (its discriminant), a canonical display name and a
//! case-insensitive parser accepting a handful of aliases.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, FieldKind, Result};

/// The longest cooking time supported, in hours.
pub const MAX_HOURS: i32 = 72;

fn invalid(kind: FieldKind, text: impl ToString) -> Error {
    Error::InvalidField {
        kind,
        text: text.to_string(),
    }
}

/// Heating power (speed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PowerLevel {
    Slow = 0,
    Medium = 1,
    Fast = 2,
    Max = 3,
}

impl PowerLevel {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(PowerLevel::Slow),
            1 => Ok(PowerLevel::Medium),
            2 => Ok(PowerLevel::Fast),
            3 => Ok(PowerLevel::Max),
            _ => Err(invalid(FieldKind::PowerLevel, code)),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerLevel::Slow => "Slow",
            PowerLevel::Medium => "Medium",
            PowerLevel::Fast => "Fast",
            PowerLevel::Max => "Max",
        }
    }
}

impl FromStr for PowerLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "slow" => Ok(PowerLevel::Slow),
            "medium" => Ok(PowerLevel::Medium),
            "high" | "fast" => Ok(PowerLevel::Fast),
            "max" => Ok(PowerLevel::Max),
            _ => Err(invalid(FieldKind::PowerLevel, s)),
        }
    }
}

impl fmt::Display for PowerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// When the countdown starts, relative to cooking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum TimerStart {
    /// Immediately.
    #[default]
    AtBeginning = 0,
    /// Once the set temperature is reached.
    AtSetTemperature = 1,
    /// When the user presses the button.
    AtPrompt = 2,
}

impl TimerStart {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(TimerStart::AtBeginning),
            1 => Ok(TimerStart::AtSetTemperature),
            2 => Ok(TimerStart::AtPrompt),
            _ => Err(invalid(FieldKind::TimerStart, code)),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimerStart::AtBeginning => "At Beginning",
            TimerStart::AtSetTemperature => "At Set Temperature",
            TimerStart::AtPrompt => "At Prompt",
        }
    }
}

impl FromStr for TimerStart {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "atbeginning" | "at beginning" | "beginning" | "immediately" => {
                Ok(TimerStart::AtBeginning)
            }
            "atsettemperature" | "at set temperature" | "at set" | "at temperature" | "set" => {
                Ok(TimerStart::AtSetTemperature)
            }
            "atprompt" | "at prompt" | "prompt" => Ok(TimerStart::AtPrompt),
            _ => Err(invalid(FieldKind::TimerStart, s)),
        }
    }
}

impl fmt::Display for TimerStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// What the cooker does once the countdown reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum AfterTimer {
    #[default]
    Continue = 0,
    Stop = 1,
    KeepWarm = 2,
    Repeat = 3,
}

impl AfterTimer {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(AfterTimer::Continue),
            1 => Ok(AfterTimer::Stop),
            2 => Ok(AfterTimer::KeepWarm),
            3 => Ok(AfterTimer::Repeat),
            _ => Err(invalid(FieldKind::AfterTimer, code)),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AfterTimer::Continue => "Continue",
            AfterTimer::Stop => "Stop",
            AfterTimer::KeepWarm => "Keep Warm",
            AfterTimer::Repeat => "Repeat",
        }
    }
}

impl FromStr for AfterTimer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuecooking" | "continue cooking" | "continue" => Ok(AfterTimer::Continue),
            "stopcooking" | "stop cooking" | "stop" => Ok(AfterTimer::Stop),
            "keepwarm" | "keep warm" | "keep" | "warm" => Ok(AfterTimer::KeepWarm),
            "repeattimer" | "repeat timer" | "repeat" => Ok(AfterTimer::Repeat),
            _ => Err(invalid(FieldKind::AfterTimer, s)),
        }
    }
}

impl fmt::Display for AfterTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Cook time, from 0:00:01 up to exactly 72:00:00. All zero means no timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Timer {
    hours: u8,
    minutes: u8,
    seconds: u8,
}

impl Timer {
    pub const OFF: Timer = Timer {
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    pub fn new(hours: i32, minutes: i32, seconds: i32) -> Result<Self> {
        let in_range = (0..=MAX_HOURS).contains(&hours)
            && (0..=59).contains(&minutes)
            && (0..=59).contains(&seconds)
            && (hours < MAX_HOURS || (minutes == 0 && seconds == 0));
        if !in_range {
            return Err(Error::TimerOutOfRange {
                hours,
                minutes,
                seconds,
            });
        }
        Ok(Self {
            hours: hours as u8,
            minutes: minutes as u8,
            seconds: seconds as u8,
        })
    }

    pub fn is_off(&self) -> bool {
        *self == Timer::OFF
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    pub fn seconds(&self) -> u8 {
        self.seconds
    }
}

impl FromStr for Timer {
    type Err = Error;

    /// Accepts `off`, `no timer` or `H:MM:SS` (parts need not be zero padded).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("off") || s.eq_ignore_ascii_case("no timer") {
            return Ok(Timer::OFF);
        }

        let parts = s
            .split(':')
            .map(|p| p.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::malformed(s, "timer must be 'off' or H:MM:SS"))?;

        match parts[..] {
            [h, m, sec] => Timer::new(h, m, sec),
            _ => Err(Error::malformed(s, "timer must be 'off' or H:MM:SS")),
        }
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_off() {
            f.pad("off")
        } else {
            f.pad(&format!(
                "{}:{:02}:{:02}",
                self.hours, self.minutes, self.seconds
            ))
        }
    }
}
