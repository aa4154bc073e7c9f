//! Concurrent per-channel sampling.
//!
//! Every channel gets its own periodic loop (read, store, sleep) on a scoped
//! thread. The loops never wait on each other; the call returns once all of
//! them have been joined. A failed read on one channel stops its siblings at
//! their next sleep boundary and the whole window is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use qs_core::{CHANNEL_COUNT, Channel, ChannelReadings};
use qs_device::{ChannelReader, DeviceError};
use tracing::{debug, warn};

use crate::aggregate::aggregate;
use crate::cancel::sleep_unless;
use crate::{CancelToken, SamplePlan, SamplingError, SamplingResult};

/// Upper bound on the per-channel buffer reserved before the first read.
const PREALLOCATED_SAMPLES: usize = 4096;

enum TaskOutcome {
    Done(Vec<f64>),
    Failed(DeviceError),
    Stopped,
}

/// Samples channels of a shared reader concurrently.
pub struct ConcurrentSampler<'a, R: ChannelReader + ?Sized> {
    reader: &'a R,
}

impl<'a, R: ChannelReader + ?Sized> ConcurrentSampler<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self { reader }
    }

    /// Sample every channel of the device and return one robust value per
    /// channel.
    pub fn sample_scale(
        &self,
        plan: &SamplePlan,
        cancel: &CancelToken,
    ) -> SamplingResult<ChannelReadings> {
        let values = self.sample_all(&Channel::ALL, plan, cancel)?;
        let values: [f64; CHANNEL_COUNT] = values
            .try_into()
            .map_err(|_| SamplingError::invalid("sampler returned a short channel set"))?;
        Ok(ChannelReadings::new(values))
    }

    /// Sample `channels` concurrently according to `plan`.
    ///
    /// Returns one aggregated value per requested channel, in the order the
    /// channels were given. Fails with the first read failure in channel
    /// order; a read failure takes precedence over cancellation.
    pub fn sample_all(
        &self,
        channels: &[Channel],
        plan: &SamplePlan,
        cancel: &CancelToken,
    ) -> SamplingResult<Vec<f64>> {
        if channels.is_empty() {
            return Err(SamplingError::invalid("no channels to sample"));
        }
        if cancel.is_cancelled() {
            return Err(SamplingError::Cancelled);
        }

        let started = Instant::now();
        let abort = AtomicBool::new(false);
        let reader = self.reader;

        let outcomes: Vec<TaskOutcome> = thread::scope(|scope| {
            let handles: Vec<_> = channels
                .iter()
                .map(|&channel| {
                    let abort = &abort;
                    scope.spawn(move || sample_channel(reader, channel, plan, cancel, abort))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });

        let mut cancelled = false;
        let mut sample_sets = Vec::with_capacity(channels.len());
        for (&channel, outcome) in channels.iter().zip(outcomes) {
            match outcome {
                TaskOutcome::Failed(source) => {
                    warn!(%channel, error = %source, "sampling window discarded");
                    return Err(SamplingError::ChannelReadFailure { channel, source });
                }
                TaskOutcome::Stopped => cancelled = true,
                TaskOutcome::Done(samples) => sample_sets.push(samples),
            }
        }
        if cancelled {
            warn!("sampling cancelled after {:?}", started.elapsed());
            return Err(SamplingError::Cancelled);
        }

        let mut values = Vec::with_capacity(channels.len());
        for (&channel, samples) in channels.iter().zip(&sample_sets) {
            let value = aggregate(samples, plan.mode())?;
            debug!(%channel, samples = samples.len(), value, "channel sampled");
            values.push(value);
        }
        debug!(
            channels = channels.len(),
            elapsed_s = started.elapsed().as_secs_f64(),
            "sampling window complete"
        );
        Ok(values)
    }
}

fn sample_channel<R: ChannelReader + ?Sized>(
    reader: &R,
    channel: Channel,
    plan: &SamplePlan,
    cancel: &CancelToken,
    abort: &AtomicBool,
) -> TaskOutcome {
    let n = plan.samples_per_channel();
    let stop = || cancel.is_cancelled() || abort.load(Ordering::SeqCst);
    let mut samples = Vec::with_capacity(n.min(PREALLOCATED_SAMPLES));

    for i in 0..n {
        if stop() {
            return TaskOutcome::Stopped;
        }
        let reading = reader.read_ratio(channel).and_then(|ratio| {
            if ratio.is_finite() {
                Ok(ratio)
            } else {
                Err(DeviceError::Read {
                    channel,
                    message: format!("non-finite ratio {ratio}"),
                })
            }
        });
        match reading {
            Ok(ratio) => samples.push(ratio),
            Err(e) => {
                abort.store(true, Ordering::SeqCst);
                return TaskOutcome::Failed(e);
            }
        }
        if i + 1 < n && !sleep_unless(plan.interval(), &stop) {
            return TaskOutcome::Stopped;
        }
    }

    TaskOutcome::Done(samples)
}
