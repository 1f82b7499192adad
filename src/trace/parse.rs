//! Dump line parser
//!
//! Turns the tagged lines written by [`report`](super::report) back into
//! typed records. Lines may carry a logger prefix in front of the tag
//! (`I (1234) QUEUE_DEBUG: ...`); only the last word before the first `:`
//! is taken as the tag.

use core::fmt;
use core::str::FromStr;

use super::record::{QueueEvent, QueueEventKind, TaskEvent, TaskEventKind, TickEvent, TraceRecord};
use super::report::{section_header, section_tag, FINISH_FLAG_TAG, TASK_NAME_TAG};
use crate::types::{OsTaskId, TraceCategory};

/// Dump line parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Fewer fields than the record needs
    MissingField,
    /// More fields than the record has
    ExtraField,
    /// Field is not a decimal number
    InvalidNumber,
    /// Event kind tag out of range
    UnknownKind(u32),
    /// Finish flag is not a hex number
    InvalidFlags,
    /// Task name line without `id;name`
    InvalidTaskName,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingField => f.write_str("missing field"),
            ParseError::ExtraField => f.write_str("unexpected extra field"),
            ParseError::InvalidNumber => f.write_str("invalid number"),
            ParseError::UnknownKind(kind) => write!(f, "unknown event kind {}", kind),
            ParseError::InvalidFlags => f.write_str("invalid finish flags"),
            ParseError::InvalidTaskName => f.write_str("invalid task name line"),
        }
    }
}

/// One recognized dump line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedLine<'a> {
    /// Column header of a section
    Header(TraceCategory),
    Record(TraceRecord),
    TaskName { id: OsTaskId, name: &'a str },
    /// End of dump with the overflow flags
    Finish(u8),
}

/// Semicolon separated numeric fields
struct Fields<'a>(core::str::Split<'a, char>);

impl<'a> Fields<'a> {
    fn new(line: &'a str) -> Self {
        Fields(line.trim().split(';'))
    }

    fn next_u32(&mut self) -> Result<u32, ParseError> {
        let field = self.0.next().ok_or(ParseError::MissingField)?;
        field.trim().parse().map_err(|_| ParseError::InvalidNumber)
    }

    fn finish(mut self) -> Result<(), ParseError> {
        match self.0.next() {
            None => Ok(()),
            Some(_) => Err(ParseError::ExtraField),
        }
    }
}

impl FromStr for QueueEvent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut f = Fields::new(s);
        let kind = f.next_u32()?;
        let event = QueueEvent {
            kind: QueueEventKind::try_from(kind).map_err(ParseError::UnknownKind)?,
            queue: f.next_u32()?,
            tick: f.next_u32()?,
            timestamp: f.next_u32()?,
            task: f.next_u32()?,
            ticks_to_wait: f.next_u32()?,
        };
        f.finish()?;
        Ok(event)
    }
}

impl FromStr for TickEvent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut f = Fields::new(s);
        let event = TickEvent {
            tick: f.next_u32()?,
            timestamp: f.next_u32()?,
            new_tick: f.next_u32()?,
            task: f.next_u32()?,
        };
        f.finish()?;
        Ok(event)
    }
}

impl FromStr for TaskEvent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut f = Fields::new(s);
        let kind = f.next_u32()?;
        let event = TaskEvent {
            kind: TaskEventKind::try_from(kind).map_err(ParseError::UnknownKind)?,
            tick: f.next_u32()?,
            timestamp: f.next_u32()?,
            task: f.next_u32()?,
            affected: f.next_u32()?,
            delay: f.next_u32()?,
        };
        f.finish()?;
        Ok(event)
    }
}

fn parse_record(category: TraceCategory, body: &str) -> Result<ParsedLine<'_>, ParseError> {
    if body == section_header(category) {
        return Ok(ParsedLine::Header(category));
    }
    let record = match category {
        TraceCategory::Queue => TraceRecord::Queue(body.parse()?),
        TraceCategory::Tick => TraceRecord::Tick(body.parse()?),
        TraceCategory::Task => TraceRecord::Task(body.parse()?),
    };
    Ok(ParsedLine::Record(record))
}

/// Parse one dump line
///
/// Returns `Ok(None)` for lines that carry no known tag, so a dump can be
/// fed in interleaved with other log output.
pub fn parse_line(line: &str) -> Result<Option<ParsedLine<'_>>, ParseError> {
    let Some((prefix, body)) = line.split_once(':') else {
        return Ok(None);
    };
    let Some(tag) = prefix.split_whitespace().last() else {
        return Ok(None);
    };
    let body = body.trim();

    if let Some(category) = TraceCategory::ALL.into_iter().find(|c| section_tag(*c) == tag) {
        return parse_record(category, body).map(Some);
    }

    match tag {
        TASK_NAME_TAG => {
            let (id, name) = body.split_once(';').ok_or(ParseError::InvalidTaskName)?;
            let id = id.trim().parse().map_err(|_| ParseError::InvalidTaskName)?;
            Ok(Some(ParsedLine::TaskName { id, name: name.trim() }))
        }
        FINISH_FLAG_TAG => {
            let digits = body.trim_start_matches("0x");
            let flags = u8::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidFlags)?;
            Ok(Some(ParsedLine::Finish(flags)))
        }
        _ => Ok(None),
    }
}
