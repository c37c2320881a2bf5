//! Hand-off of events from the locus workers to a single writer thread.
//!
//! Producers push onto an unbounded channel and count the backlog. Once the
//! backlog reaches the high-water mark every producer blocks until the
//! writer has drained it to the low-water mark.

use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::error::{Result, SpliceGraphError};
use crate::events::event::SplicingEvent;

/// Destination of the event stream.
pub trait EventWriter: Send {
    fn write_event(&mut self, event: &SplicingEvent) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

impl EventWriter for Vec<SplicingEvent> {
    fn write_event(&mut self, event: &SplicingEvent) -> io::Result<()> {
        self.push(event.clone());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One tab-separated line per event, prefixed with the chromosome name.
pub struct TsvWriter<W: Write + Send> {
    out: BufWriter<W>,
    chr_names: Vec<String>,
}

impl<W: Write + Send> TsvWriter<W> {
    pub const HEADER: &'static str =
        "#chr\tstrand\tsrc\tsnk\tdim\tstructure\ttranscripts\tsites\tcds";

    pub fn new(out: W, chr_names: Vec<String>) -> io::Result<Self> {
        let mut out = BufWriter::new(out);
        writeln!(out, "{}", Self::HEADER)?;
        Ok(Self { out, chr_names })
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.out.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write + Send> EventWriter for TsvWriter<W> {
    fn write_event(&mut self, event: &SplicingEvent) -> io::Result<()> {
        match self.chr_names.get(event.chr_id) {
            Some(name) => writeln!(self.out, "{name}\t{event}"),
            None => writeln!(self.out, "{}\t{event}", event.chr_id),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SinkConfig {
    /// Producers block once this many events are queued.
    pub high_water: usize,
    /// ...and resume when the writer has drained the queue to this size.
    pub low_water: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            high_water: 4096,
            low_water: 1024,
        }
    }
}

#[derive(Debug, Default)]
struct BacklogState {
    queued: usize,
    paused: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Backlog {
    state: Mutex<BacklogState>,
    resume: Condvar,
}

impl Backlog {
    fn lock(&self) -> MutexGuard<'_, BacklogState> {
        // A panicking holder cannot leave the counters half-updated.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close(&self) {
        self.lock().closed = true;
        self.resume.notify_all();
    }
}

/// Cloneable handle used by the workers.
#[derive(Clone)]
pub struct EventProducer {
    tx: Sender<SplicingEvent>,
    backlog: Arc<Backlog>,
    high_water: usize,
}

impl EventProducer {
    /// Queue an event, blocking while the writer is behind.
    pub fn push(&self, event: SplicingEvent) -> Result<()> {
        {
            let mut state = self.backlog.lock();
            while state.paused && !state.closed {
                state = self
                    .backlog
                    .resume
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
            if state.closed {
                return Err(SpliceGraphError::SinkClosed);
            }
            state.queued += 1;
            if state.queued >= self.high_water {
                state.paused = true;
            }
        }
        self.tx.send(event).map_err(|_| SpliceGraphError::SinkClosed)
    }
}

/// Writer thread plus the producer side of its queue.
pub struct EventSink<W: EventWriter + 'static> {
    producer: EventProducer,
    handle: JoinHandle<Result<W>>,
}

impl<W: EventWriter + 'static> EventSink<W> {
    pub fn spawn(writer: W, config: SinkConfig) -> Result<Self> {
        let high_water = config.high_water.max(1);
        let low_water = config.low_water.min(high_water - 1);
        let (tx, rx) = channel::unbounded::<SplicingEvent>();
        let backlog = Arc::new(Backlog::default());

        let consumer_backlog = Arc::clone(&backlog);
        let handle = thread::Builder::new()
            .name("event-sink".into())
            .spawn(move || drain(writer, rx, &consumer_backlog, low_water))?;

        Ok(Self {
            producer: EventProducer {
                tx,
                backlog,
                high_water,
            },
            handle,
        })
    }

    pub fn producer(&self) -> EventProducer {
        self.producer.clone()
    }

    /// Close the queue, wait for the writer to flush, and hand it back.
    ///
    /// Every producer handed out must have been dropped, otherwise the
    /// writer keeps waiting for more events.
    pub fn finish(self) -> Result<W> {
        drop(self.producer);
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(SpliceGraphError::SinkClosed),
        }
    }
}

/// Closes the backlog when the writer thread ends, panics included, so no
/// producer stays parked on the condvar.
struct CloseOnDrop<'a>(&'a Backlog);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn drain<W: EventWriter>(
    mut writer: W,
    rx: Receiver<SplicingEvent>,
    backlog: &Backlog,
    low_water: usize,
) -> Result<W> {
    let _close = CloseOnDrop(backlog);
    let mut written = 0usize;
    for event in rx {
        if let Err(e) = writer.write_event(&event) {
            warn!(written, error = %e, "event writer failed, closing sink");
            return Err(e.into());
        }
        written += 1;

        let mut state = backlog.lock();
        state.queued = state.queued.saturating_sub(1);
        if state.paused && state.queued <= low_water {
            state.paused = false;
            debug!(queued = state.queued, "event sink resumed producers");
            drop(state);
            backlog.resume.notify_all();
        }
    }
    writer.flush()?;
    info!(written, "event sink finished");
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::site::{SiteKind, SpliceSite};
    use crate::types::Strand;

    fn event(pos: i64) -> SplicingEvent {
        SplicingEvent {
            chr_id: 0,
            strand: Strand::Plus,
            src: SpliceSite::new(pos, SiteKind::Donor, 0),
            snk: SpliceSite::new(pos + 100, SiteKind::Acceptor, 0),
            dimension: 2,
            variants: Vec::new(),
            cds_summary: None,
        }
    }

    #[test]
    fn many_producers_one_writer() {
        let sink = EventSink::spawn(
            Vec::new(),
            SinkConfig {
                high_water: 3,
                low_water: 1,
            },
        )
        .unwrap();

        crossbeam::scope(|s| {
            for worker in 0..4i64 {
                let producer = sink.producer();
                s.spawn(move |_| {
                    for i in 0..50 {
                        producer.push(event(worker * 1_000 + i)).unwrap();
                    }
                });
            }
        })
        .unwrap();

        let events = sink.finish().unwrap();
        assert_eq!(events.len(), 200);
        // Per-producer order is kept.
        let first: Vec<i64> = events
            .iter()
            .map(|e| e.src.pos)
            .filter(|&p| p < 1_000)
            .collect();
        assert_eq!(first, (0..50).collect::<Vec<_>>());
    }

    struct Failing;

    impl EventWriter for Failing {
        fn write_event(&mut self, _: &SplicingEvent) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn a_failed_writer_closes_the_sink() {
        let sink = EventSink::spawn(
            Failing,
            SinkConfig {
                high_water: 2,
                low_water: 0,
            },
        )
        .unwrap();
        let producer = sink.producer();
        let mut refused = false;
        for i in 0..100 {
            if matches!(producer.push(event(i)), Err(SpliceGraphError::SinkClosed)) {
                refused = true;
                break;
            }
        }
        assert!(refused);
        drop(producer);
        assert!(matches!(sink.finish(), Err(SpliceGraphError::Io(_))));
    }

    struct Panicking;

    impl EventWriter for Panicking {
        fn write_event(&mut self, _: &SplicingEvent) -> io::Result<()> {
            panic!("writer blew up");
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn a_panicking_writer_releases_paused_producers() {
        let sink = EventSink::spawn(
            Panicking,
            SinkConfig {
                high_water: 1,
                low_water: 0,
            },
        )
        .unwrap();
        let producer = sink.producer();
        // The first push pauses the queue; the next one waits until the
        // writer thread is gone and must then be refused.
        producer.push(event(0)).unwrap();
        assert!(matches!(producer.push(event(1)), Err(SpliceGraphError::SinkClosed)));
        drop(producer);
        assert!(matches!(sink.finish(), Err(SpliceGraphError::SinkClosed)));
    }

    #[test]
    fn tsv_lines_carry_the_chromosome_name() {
        let mut w = TsvWriter::new(Vec::new(), vec!["chr7".to_string()]).unwrap();
        w.write_event(&event(200)).unwrap();
        w.flush().unwrap();
        let text = String::from_utf8(w.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(TsvWriter::<Vec<u8>>::HEADER));
        assert_eq!(lines.next(), Some("chr7\t+\t200^\t300-\t2\t\t\t\t."));
    }
}
