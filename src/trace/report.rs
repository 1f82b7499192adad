//! Trace dump and monitor task
//!
//! Output is line oriented. Every line carries a tag naming its section:
//!
//! ```text
//! TASK_NAME: 3;producer
//! QUEUE_DEBUG: Message Type;Queue;C Time;Timestamp;Task ID;Ticks to wait
//! QUEUE_DEBUG: 4;77;10;12345;3;0
//! TICK_DEBUG: C Time;Timestamp;New Tick Time;Task ID
//! TICK_DEBUG: 41;900;42;2
//! TASK_DEBUG: Message Type;C Time;Timestamp;Task ID;Affected Task ID;Delay
//! TASK_DEBUG: 5;41;902;2;2;0
//! FINISH_FLAG: 0
//! ```
//!
//! Sections are written in the fixed order queue, tick, task. Within a
//! section records appear in write order.

use core::fmt::{self, Display, Write};

use super::{TracePort, Tracer};
use crate::config::{CFG_MONITOR_POLL_TICKS, CFG_MONITOR_SETTLE_TICKS};
use crate::types::{OsTaskId, OsTick, TraceCategory};

/// Tag of task name lines
pub const TASK_NAME_TAG: &str = "TASK_NAME";

/// Tag of the line closing a dump
pub const FINISH_FLAG_TAG: &str = "FINISH_FLAG";

/// Line tag of a record section
pub const fn section_tag(category: TraceCategory) -> &'static str {
    match category {
        TraceCategory::Queue => "QUEUE_DEBUG",
        TraceCategory::Tick => "TICK_DEBUG",
        TraceCategory::Task => "TASK_DEBUG",
    }
}

/// Column header of a record section
pub const fn section_header(category: TraceCategory) -> &'static str {
    match category {
        TraceCategory::Queue => "Message Type;Queue;C Time;Timestamp;Task ID;Ticks to wait",
        TraceCategory::Tick => "C Time;Timestamp;New Tick Time;Task ID",
        TraceCategory::Task => "Message Type;C Time;Timestamp;Task ID;Affected Task ID;Delay",
    }
}

/// Read position per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DumpCursor {
    pub queue: usize,
    pub tick: usize,
    pub task: usize,
}

impl DumpCursor {
    pub const fn new() -> Self {
        DumpCursor { queue: 0, tick: 0, task: 0 }
    }

    #[inline]
    pub fn get(&self, category: TraceCategory) -> usize {
        match category {
            TraceCategory::Queue => self.queue,
            TraceCategory::Tick => self.tick,
            TraceCategory::Task => self.task,
        }
    }

    #[inline]
    fn set(&mut self, category: TraceCategory, position: usize) {
        match category {
            TraceCategory::Queue => self.queue = position,
            TraceCategory::Tick => self.tick = position,
            TraceCategory::Task => self.task = position,
        }
    }
}

fn write_line<W: Write>(out: &mut W, tag: &str, body: impl Display) -> fmt::Result {
    writeln!(out, "{}: {}", tag, body)
}

fn write_records<W, I>(out: &mut W, category: TraceCategory, records: I) -> fmt::Result
where
    W: Write,
    I: Iterator,
    I::Item: Display,
{
    let tag = section_tag(category);
    for record in records {
        write_line(out, tag, record)?;
    }
    Ok(())
}

/// Write the records of one category from `start`, returning the new position
fn write_section<P, W, const QN: usize, const KN: usize, const TN: usize>(
    tracer: &Tracer<P, QN, KN, TN>,
    out: &mut W,
    category: TraceCategory,
    start: usize,
    header: bool,
) -> Result<usize, fmt::Error>
where
    P: TracePort,
    W: Write,
{
    if header {
        write_line(out, section_tag(category), section_header(category))?;
    }

    // Records stop at the length observed on entry; later writes belong to
    // the next pass.
    let end = tracer.len(category);
    let count = end.saturating_sub(start);
    match category {
        TraceCategory::Queue => {
            write_records(out, category, tracer.queue_events().iter_from(start).take(count))?
        }
        TraceCategory::Tick => {
            write_records(out, category, tracer.tick_events().iter_from(start).take(count))?
        }
        TraceCategory::Task => {
            write_records(out, category, tracer.task_events().iter_from(start).take(count))?
        }
    }
    Ok(end.max(start))
}

/// Write the task name mapping lines
pub fn write_task_names<W: Write>(out: &mut W, names: &[(OsTaskId, &str)]) -> fmt::Result {
    for (id, name) in names {
        writeln!(out, "{}: {};{}", TASK_NAME_TAG, id, name)?;
    }
    Ok(())
}

/// Write the closing line with the overflow flags in hex
pub fn write_finish<W: Write>(out: &mut W, flags: u8) -> fmt::Result {
    writeln!(out, "{}: {:x}", FINISH_FLAG_TAG, flags)
}

/// Full dump of all three buffers
pub fn dump<P, W, const QN: usize, const KN: usize, const TN: usize>(
    tracer: &Tracer<P, QN, KN, TN>,
    out: &mut W,
    names: &[(OsTaskId, &str)],
) -> fmt::Result
where
    P: TracePort,
    W: Write,
{
    let mut cursor = DumpCursor::new();
    dump_from(tracer, out, names, &mut cursor, true)
}

/// Dump records written since `cursor` and advance it
///
/// With `headers` set, every section starts with its column header.
pub fn dump_from<P, W, const QN: usize, const KN: usize, const TN: usize>(
    tracer: &Tracer<P, QN, KN, TN>,
    out: &mut W,
    names: &[(OsTaskId, &str)],
    cursor: &mut DumpCursor,
    headers: bool,
) -> fmt::Result
where
    P: TracePort,
    W: Write,
{
    write_task_names(out, names)?;
    for category in TraceCategory::ALL {
        let next = write_section(tracer, out, category, cursor.get(category), headers)?;
        cursor.set(category, next);
    }
    write_finish(out, tracer.error_flags())
}

/// Diagnostic consumer task
///
/// Waits for the buffers to populate, writes a full dump, then optionally
/// keeps polling and writes only what was recorded since the previous pass.
pub struct Monitor<'t, P, const QN: usize, const KN: usize, const TN: usize> {
    tracer: &'t Tracer<P, QN, KN, TN>,
    names: &'t [(OsTaskId, &'t str)],
    cursor: DumpCursor,
    settle_ticks: OsTick,
    poll_ticks: OsTick,
    settled: bool,
    dumped: bool,
}

impl<'t, P, const QN: usize, const KN: usize, const TN: usize> Monitor<'t, P, QN, KN, TN>
where
    P: TracePort,
{
    pub fn new(tracer: &'t Tracer<P, QN, KN, TN>) -> Self {
        Monitor {
            tracer,
            names: &[],
            cursor: DumpCursor::new(),
            settle_ticks: CFG_MONITOR_SETTLE_TICKS,
            poll_ticks: CFG_MONITOR_POLL_TICKS,
            settled: false,
            dumped: false,
        }
    }

    /// Task names emitted before every dump
    pub fn with_names(mut self, names: &'t [(OsTaskId, &'t str)]) -> Self {
        self.names = names;
        self
    }

    pub fn with_settle_ticks(mut self, ticks: OsTick) -> Self {
        self.settle_ticks = ticks;
        self
    }

    pub fn with_poll_ticks(mut self, ticks: OsTick) -> Self {
        self.poll_ticks = ticks;
        self
    }

    #[inline]
    pub fn cursor(&self) -> DumpCursor {
        self.cursor
    }

    /// Emit everything not yet emitted
    ///
    /// The first pass carries section headers, later passes only records.
    pub fn pass<W: Write>(&mut self, out: &mut W) -> fmt::Result {
        let headers = !self.dumped;
        self.dumped = true;
        dump_from(self.tracer, out, self.names, &mut self.cursor, headers)
    }

    /// Wait the settle delay once, then dump
    ///
    /// `delay` blocks the calling task for the given number of ticks.
    pub fn run_once<W, D>(&mut self, out: &mut W, mut delay: D) -> fmt::Result
    where
        W: Write,
        D: FnMut(OsTick),
    {
        if !self.settled {
            delay(self.settle_ticks);
            self.settled = true;
        }
        crate::info!("monitor: dumping trace buffers");
        self.pass(out)
    }

    /// Dump, then keep polling until `stop` returns true
    pub fn run_until<W, D, S>(&mut self, out: &mut W, mut delay: D, mut stop: S) -> fmt::Result
    where
        W: Write,
        D: FnMut(OsTick),
        S: FnMut() -> bool,
    {
        self.run_once(out, &mut delay)?;
        while !stop() {
            delay(self.poll_ticks);
            self.pass(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::String;

    use super::*;

    #[test]
    fn test_section_tags() {
        assert_eq!(section_tag(TraceCategory::Tick), "TICK_DEBUG");
        assert!(section_header(TraceCategory::Queue).starts_with("Message Type;Queue"));
        assert_eq!(section_header(TraceCategory::Task).split(';').count(), 6);
    }

    #[test]
    fn test_finish_flag_is_hex() {
        let mut out = String::new();
        write_finish(&mut out, 0x07).unwrap();
        write_finish(&mut out, 0).unwrap();
        assert_eq!(out, "FINISH_FLAG: 7\nFINISH_FLAG: 0\n");
    }

    #[test]
    fn test_task_names() {
        let mut out = String::new();
        write_task_names(&mut out, &[(3, "producer"), (9, "monitor")]).unwrap();
        assert_eq!(out, "TASK_NAME: 3;producer\nTASK_NAME: 9;monitor\n");
    }
}
