use crate::event::{RunSummary, SyncEvent};
use std::io::Write;
use std::sync::Mutex;

/// Controls whether a [`WriterSink`] appends a trailing newline per event.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LineMode {
    /// Append a newline terminator after each rendered event.
    #[default]
    WithNewline,
    /// Emit the rendered event without a trailing newline.
    WithoutNewline,
}

impl LineMode {
    const fn append_newline(self) -> bool {
        matches!(self, Self::WithNewline)
    }
}

/// Collaborator interface the engine reports events through.
///
/// Implementations must be infallible from the engine's perspective: `emit`
/// returns nothing and must not panic. Sinks writing to fallible targets
/// handle or swallow their own errors.
pub trait EventSink {
    /// Receives one event per terminal action applied.
    fn emit(&self, event: &SyncEvent);

    /// Receives the aggregated counts once per completed run.
    fn emit_summary(&self, summary: &RunSummary);
}

/// Renders events as text lines into an [`std::io::Write`] target.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: Mutex<W>,
    line_mode: LineMode,
}

impl<W: Write> WriterSink<W> {
    /// Creates a sink writing to `writer` with the default line mode.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self::with_line_mode(writer, LineMode::default())
    }

    /// Creates a sink writing to `writer` with an explicit [`LineMode`].
    #[must_use]
    pub fn with_line_mode(writer: W, line_mode: LineMode) -> Self {
        Self {
            writer: Mutex::new(writer),
            line_mode,
        }
    }

    /// Consumes the sink and returns the underlying writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_line(&self, rendered: &str) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        // Write failures are swallowed: the sink contract is that emission
        // never fails into the engine.
        if self.line_mode.append_newline() {
            let _ = writeln!(writer, "{rendered}");
        } else {
            let _ = write!(writer, "{rendered}");
        }
    }
}

impl<W: Write> EventSink for WriterSink<W> {
    fn emit(&self, event: &SyncEvent) {
        self.write_line(&event.to_string());
    }

    fn emit_summary(&self, summary: &RunSummary) {
        self.write_line(&summary.to_string());
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &SyncEvent) {}

    fn emit_summary(&self, _summary: &RunSummary) {}
}

/// Records events in memory for test assertions.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SyncEvent>>,
    summaries: Mutex<Vec<RunSummary>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SyncEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns a snapshot of the recorded summaries.
    #[must_use]
    pub fn summaries(&self) -> Vec<RunSummary> {
        match self.summaries.lock() {
            Ok(summaries) => summaries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn emit_summary(&self, summary: &RunSummary) {
        if let Ok(mut summaries) = self.summaries.lock() {
            summaries.push(*summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn writer_sink_appends_newline_by_default() {
        let sink = WriterSink::new(Vec::new());
        sink.emit(&SyncEvent::success("a.txt", EventKind::Create));
        sink.emit(&SyncEvent::success("b.txt", EventKind::Skip));

        let output = String::from_utf8(sink.into_inner()).expect("utf8");
        assert_eq!(output, "create 'a.txt'\nskip 'b.txt'\n");
    }

    #[test]
    fn writer_sink_without_newline_leaves_line_open() {
        let sink = WriterSink::with_line_mode(Vec::new(), LineMode::WithoutNewline);
        sink.emit(&SyncEvent::success("a.txt", EventKind::Delete));

        let output = sink.into_inner();
        assert!(output.ends_with(b"delete 'a.txt'"));
    }

    #[test]
    fn memory_sink_records_events_and_summary() {
        let sink = MemorySink::new();
        sink.emit(&SyncEvent::failure("x", EventKind::UpdateContent, "boom"));
        sink.emit_summary(&RunSummary {
            failed: 1,
            ..RunSummary::default()
        });

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_failure());
        assert_eq!(sink.summaries().len(), 1);
        assert_eq!(sink.summaries()[0].failed, 1);
    }
}
