// SPDX-License-Identifier: Apache-2.0

//! Foreground half of the acquisition: drains full windows, reports their averages and hands the
//! buffers back to the engine.

use crate::{
    buffer::{BufferStatus, Sample, SampleCounter},
    channel::{AcquisitionChannel, BufferId, FaultReport},
    engine::TransferEngine,
};

/// Aggregates emitted after every drained window.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    /// Mean of the latest window drained from ping
    pub primary_average: Sample,
    /// Mean of the latest window drained from pong
    pub alternate_average: Sample,
    /// Samples in all reported windows so far
    pub samples_taken: u64,
    /// Fault counters at the time of the report
    pub faults: FaultReport,
}

/// Receives [`Report`]s, e.g. a console.
pub trait ReportSink {
    /// Handle one report
    fn report(&mut self, report: &Report);
}

impl<F: FnMut(&Report)> ReportSink for F {
    fn report(&mut self, report: &Report) {
        self(report)
    }
}

/// What happened to a window in [`Consumer::drain`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Drained {
    /// Buffer was not full; nothing was touched
    NotReady,
    /// Window was flagged by the controller and thrown away
    Discarded,
    /// Window was averaged and reported
    Reported(Sample),
}

/// Arithmetic mean of a window, truncated
pub fn mean(samples: &[Sample]) -> Sample {
    if samples.is_empty() {
        return 0;
    }
    let sum: u64 = samples.iter().map(|&sample| u64::from(sample)).sum();
    (sum / samples.len() as u64) as Sample
}

/// Polling consumer. Never blocks: each [`Consumer::poll`] checks both buffers once.
pub struct Consumer<const N: usize> {
    /// Shared double-buffer state
    channel: &'static AcquisitionChannel<N>,
    /// Address of the sample source register, for re-arming
    source: u32,
    /// Latest averages and totals
    report: Report,
    /// Running total of reported samples
    samples_taken: SampleCounter,
}

impl<const N: usize> Consumer<N> {
    /// Create a consumer for `channel`, re-arming transfers from the register at `source`
    pub fn new(channel: &'static AcquisitionChannel<N>, source: u32) -> Self {
        Self {
            channel,
            source,
            report: Report::default(),
            samples_taken: SampleCounter::default(),
        }
    }

    /// Latest report, whether or not it has been emitted yet
    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Check both buffers once, ping first. Returns how many windows were drained.
    pub fn poll<E: TransferEngine, S: ReportSink>(&mut self, engine: &mut E, sink: &mut S) -> usize {
        let mut drained = 0;
        for id in [BufferId::Ping, BufferId::Pong] {
            if self.drain(id, engine, sink) != Drained::NotReady {
                drained += 1;
            }
        }
        drained
    }

    /// Drain one buffer if it is full: average it, zero it, mark it empty and re-arm it. A buffer
    /// in any other state is left alone.
    pub fn drain<E: TransferEngine, S: ReportSink>(
        &mut self,
        id: BufferId,
        engine: &mut E,
        sink: &mut S,
    ) -> Drained {
        let buffer = self.channel.buffer(id);
        if buffer.status() != BufferStatus::Full {
            return Drained::NotReady;
        }

        // SAFETY: the engine never writes to a full buffer
        let average = unsafe {
            buffer.drain_with(|samples| {
                #[cfg(feature = "trace_windows")]
                trace!("{:?} window: {:?}", id, &samples[..]);
                mean(samples)
            })
        };
        let discard = buffer.take_discard();

        if let Err(err) = self.channel.mark_empty(id) {
            error!("Drained buffer changed state underneath consumer: {:?}", err);
            return Drained::Discarded;
        }
        self.channel.rearm(id, self.source, engine);

        self.report.faults = self.check_faults();
        if discard {
            warn!("Discarded faulted window in {:?}", id);
            return Drained::Discarded;
        }

        match id {
            BufferId::Ping => self.report.primary_average = average,
            BufferId::Pong => self.report.alternate_average = average,
        }
        self.samples_taken.increment_by(N);
        self.report.samples_taken = self.samples_taken.get_counter();
        sink.report(&self.report);
        Drained::Reported(average)
    }

    /// Read the fault counters, logging any that moved since the last report
    fn check_faults(&self) -> FaultReport {
        let faults = self.channel.faults().snapshot();
        let previous = self.report.faults;
        if faults.overruns != previous.overruns {
            warn!(
                "Buffer overrun: capture stalled until drained ({} total)",
                faults.overruns
            );
        }
        if faults.engine_faults != previous.engine_faults {
            error!("Transfer engine fault ({} total)", faults.engine_faults);
        }
        if faults.unexpected != previous.unexpected {
            error!(
                "Completion for a buffer which was not filling ({} total)",
                faults.unexpected
            );
        }
        faults
    }
}
