//! Deterministic reader for tests.
//!
//! Every channel replays a fixed sequence of ratios (wrapping around at the
//! end). A channel can be told to fail after a given number of reads, and the
//! instant of every read is recorded so tests can check how reads from
//! different channels interleave.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use qs_core::{CHANNEL_COUNT, Channel, DeviceSerial};

use crate::{ChannelReader, DeviceError, DeviceResult};

#[derive(Default)]
struct Script {
    reads: [usize; CHANNEL_COUNT],
    read_times: [Vec<Instant>; CHANNEL_COUNT],
    fail_after: [Option<usize>; CHANNEL_COUNT],
    opened: Vec<(DeviceSerial, Channel)>,
    intervals: [Option<Duration>; CHANNEL_COUNT],
}

pub struct ScriptedReader {
    sequences: [Vec<f64>; CHANNEL_COUNT],
    refuse_attach: bool,
    script: Mutex<Script>,
}

impl ScriptedReader {
    /// Each channel replays its own sequence. An empty sequence reads as 0.0.
    pub fn new(sequences: [Vec<f64>; CHANNEL_COUNT]) -> Self {
        Self {
            sequences,
            refuse_attach: false,
            script: Mutex::new(Script::default()),
        }
    }

    /// Every read of channel `c` returns `values[c]`.
    pub fn constant(values: [f64; CHANNEL_COUNT]) -> Self {
        Self::new(values.map(|v| vec![v]))
    }

    /// Reads of `channel` succeed `reads` times, then fail.
    pub fn fail_after(self, channel: Channel, reads: usize) -> Self {
        self.lock().fail_after[channel.index()] = Some(reads);
        self
    }

    /// `open` fails for every channel.
    pub fn refusing_attach(mut self) -> Self {
        self.refuse_attach = true;
        self
    }

    pub fn read_count(&self, channel: Channel) -> usize {
        self.lock().reads[channel.index()]
    }

    pub fn total_reads(&self) -> usize {
        self.lock().reads.iter().sum()
    }

    pub fn read_times(&self, channel: Channel) -> Vec<Instant> {
        self.lock().read_times[channel.index()].clone()
    }

    pub fn opened(&self) -> Vec<(DeviceSerial, Channel)> {
        self.lock().opened.clone()
    }

    pub fn interval(&self, channel: Channel) -> Option<Duration> {
        self.lock().intervals[channel.index()]
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChannelReader for ScriptedReader {
    fn open(
        &mut self,
        serial: DeviceSerial,
        channel: Channel,
        _timeout: Duration,
    ) -> DeviceResult<()> {
        if self.refuse_attach {
            return Err(DeviceError::Attachment {
                serial,
                channel,
                message: "timed out waiting for attachment".to_string(),
            });
        }
        self.lock().opened.push((serial, channel));
        Ok(())
    }

    fn min_sample_interval(&self, _channel: Channel) -> DeviceResult<Duration> {
        Ok(Duration::from_millis(1))
    }

    fn set_sample_interval(&mut self, channel: Channel, interval: Duration) -> DeviceResult<()> {
        self.lock().intervals[channel.index()] = Some(interval);
        Ok(())
    }

    fn read_ratio(&self, channel: Channel) -> DeviceResult<f64> {
        let idx = channel.index();
        let mut script = self.lock();
        let n = script.reads[idx];
        if script.fail_after[idx].is_some_and(|limit| n >= limit) {
            return Err(DeviceError::Read {
                channel,
                message: format!("scripted failure after {n} reads"),
            });
        }
        script.reads[idx] += 1;
        script.read_times[idx].push(Instant::now());

        let sequence = &self.sequences[idx];
        if sequence.is_empty() {
            return Ok(0.0);
        }
        Ok(sequence[n % sequence.len()])
    }
}
