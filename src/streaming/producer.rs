//! Producer threads feeding interval streams through bounded channels.
//!
//! Each input (the query and every streamed source) is parsed on its own
//! thread and pushed into a bounded crossbeam channel. A full channel blocks
//! the producer; an empty one blocks the merge engine when it needs more
//! look-ahead. When the consumer drops its receiver, the next send fails and
//! the producer exits without reading the rest of its input.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::bounded;

use crate::error::{AnnoError, Result};
use crate::interval::Interval;

/// Pull interface over a coordinate-sorted sequence of intervals.
pub type IntervalStream = Box<dyn Iterator<Item = Result<Interval>> + Send>;

/// Handle to a running producer thread.
#[derive(Debug)]
pub struct Producer {
    name: String,
    handle: JoinHandle<usize>,
}

impl Producer {
    /// Name of the input this producer reads.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the thread to finish, returning the number of intervals sent.
    ///
    /// The matching receiver must have been dropped or drained first.
    pub fn join(self) -> Result<usize> {
        self.handle.join().map_err(|_| {
            AnnoError::Io(io::Error::other(format!(
                "reader thread for '{}' panicked",
                self.name
            )))
        })
    }
}

/// Spawn a thread that drains `records` into a bounded channel.
///
/// The first error is forwarded to the consumer, labelled with `name`, and
/// ends the producer.
pub fn spawn_producer<I>(
    name: impl Into<String>,
    records: I,
    capacity: usize,
) -> Result<(IntervalStream, Producer)>
where
    I: Iterator<Item = Result<Interval>> + Send + 'static,
{
    let name = name.into();
    let (tx, rx) = bounded(capacity.max(1));

    let thread_name = format!("reader:{}", name);
    let label = name.clone();
    let handle = thread::Builder::new().name(thread_name).spawn(move || {
        let mut sent: usize = 0;
        for item in records {
            let failed = item.is_err();
            let item = item.map_err(|e| e.in_file(label.as_str()));
            if tx.send(item).is_err() {
                break;
            }
            if failed {
                break;
            }
            sent += 1;
        }
        sent
    })?;

    tracing::trace!("spawned reader for {}", name);
    Ok((Box::new(rx.into_iter()), Producer { name, handle }))
}

/// Wrap an in-memory sequence as a stream (no thread).
pub fn stream_from_vec(intervals: Vec<Interval>) -> IntervalStream {
    Box::new(intervals.into_iter().map(Ok))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals(n: u64) -> Vec<Interval> {
        (0..n).map(|i| Interval::new("chr1", i * 10, i * 10 + 5)).collect()
    }

    #[test]
    fn test_producer_preserves_order() {
        let records = intervals(100).into_iter().map(Ok);
        let (stream, producer) = spawn_producer("test", records, 4).unwrap();
        let starts: Vec<u64> = stream.map(|r| r.unwrap().start).collect();
        assert_eq!(starts, (0..100).map(|i| i * 10).collect::<Vec<_>>());
        assert_eq!(producer.join().unwrap(), 100);
    }

    #[test]
    fn test_producer_forwards_error_and_stops() {
        let records = vec![
            Ok(Interval::new("chr1", 1, 2)),
            Err(AnnoError::Parse {
                line: 2,
                message: "bad".to_string(),
            }),
            Ok(Interval::new("chr1", 3, 4)),
        ];
        let (stream, producer) = spawn_producer("bad", records.into_iter(), 8).unwrap();
        let items: Vec<_> = stream.collect();
        assert_eq!(items.len(), 2);
        match &items[1] {
            Err(AnnoError::Source { file, source }) => {
                assert_eq!(file, "bad");
                assert!(matches!(**source, AnnoError::Parse { line: 2, .. }));
            }
            other => panic!("expected a labelled parse error, got {:?}", other),
        }
        assert_eq!(producer.join().unwrap(), 1);
    }

    #[test]
    fn test_dropped_receiver_releases_producer() {
        let records = intervals(10_000).into_iter().map(Ok);
        let (mut stream, producer) = spawn_producer("big", records, 2).unwrap();
        assert!(stream.next().is_some());
        drop(stream);
        assert!(producer.join().unwrap() < 10_000);
    }
}
