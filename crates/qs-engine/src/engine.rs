//! The weighing state machine.
//!
//! ```text
//! Uncalibrated --calibrate--> Calibrated <--tare / calibrate--> Tared
//! ```
//!
//! Coefficients and the tare offset live in one [`WeighingEngine`] value and
//! are only written through `&mut self`. Every mutating operation computes its
//! result first and commits at the end, so a failure leaves the engine as it
//! was.

use std::time::Duration;

use qs_calibration::{CalibrationSolver, Trial};
use qs_core::{CHANNEL_COUNT, Channel, ChannelReadings, Coefficients, DeviceSerial};
use qs_device::{ChannelReader, DeviceError};
use qs_sampling::{CancelToken, ConcurrentSampler, SamplePlan};
use qs_store::CoefficientStore;
use serde::Serialize;
use tracing::{debug, info};

use crate::{EngineConfig, Operator, OperatorPrompt, ScaleError, ScaleResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScaleState {
    Uncalibrated,
    Calibrated,
    Tared,
}

impl ScaleState {
    pub fn is_calibrated(self) -> bool {
        !matches!(self, ScaleState::Uncalibrated)
    }
}

/// One trial as it was recorded during calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialRecord {
    pub readings: ChannelReadings,
    pub mass: f64,
}

/// Outcome of a successful calibration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub serial: DeviceSerial,
    pub coefficients: Coefficients,
    /// Constant term of the fit. Reported only; the offset is reset to the
    /// configured default instead.
    pub bias: f64,
    pub trials: Vec<TrialRecord>,
}

pub struct WeighingEngine<R: ChannelReader, S: CoefficientStore> {
    serial: DeviceSerial,
    reader: R,
    store: S,
    config: EngineConfig,
    coefficients: Option<Coefficients>,
    offset: f64,
    state: ScaleState,
}

impl<R: ChannelReader, S: CoefficientStore> WeighingEngine<R, S> {
    /// Attach every channel of `serial` and load its stored coefficients.
    ///
    /// A missing store row is not an error: the engine starts uncalibrated.
    pub fn open(
        serial: DeviceSerial,
        mut reader: R,
        store: S,
        config: EngineConfig,
    ) -> ScaleResult<Self> {
        config.validate()?;

        let timeout = Duration::from_millis(config.attach_timeout_ms);
        for channel in Channel::ALL {
            attach(&mut reader, serial, channel, timeout)
                .map_err(ScaleError::AttachmentFailure)?;
        }

        let coefficients = match store.load(serial) {
            Ok(coefficients) => Some(coefficients),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let state = if coefficients.is_some() {
            ScaleState::Calibrated
        } else {
            ScaleState::Uncalibrated
        };

        info!(%serial, ?state, offset = config.default_offset, "scale opened");
        Ok(Self {
            serial,
            reader,
            store,
            offset: config.default_offset,
            config,
            coefficients,
            state,
        })
    }

    pub fn serial(&self) -> DeviceSerial {
        self.serial
    }

    pub fn state(&self) -> ScaleState {
        self.state
    }

    pub fn coefficients(&self) -> Option<&Coefficients> {
        self.coefficients.as_ref()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// One synchronous read per channel, no filtering.
    pub fn instantaneous_weight(&self) -> ScaleResult<f64> {
        let coefficients = self.require_coefficients()?;
        let mut values = [0.0; CHANNEL_COUNT];
        for channel in Channel::ALL {
            let ratio = self
                .reader
                .read_ratio(channel)
                .map_err(ScaleError::ReadFailure)?;
            if !ratio.is_finite() {
                return Err(ScaleError::ReadFailure(DeviceError::Read {
                    channel,
                    message: format!("non-finite ratio {ratio}"),
                }));
            }
            values[channel.index()] = ratio;
        }
        Ok(coefficients.weigh(&ChannelReadings::new(values)) - self.offset)
    }

    pub fn filtered_weight(&self, samples: usize, rate_hz: f64) -> ScaleResult<f64> {
        self.filtered_weight_with(samples, rate_hz, &CancelToken::new())
    }

    /// Median-filtered weight over `samples` reads per channel at `rate_hz`.
    pub fn filtered_weight_with(
        &self,
        samples: usize,
        rate_hz: f64,
        cancel: &CancelToken,
    ) -> ScaleResult<f64> {
        let coefficients = self.require_coefficients()?;
        let plan = SamplePlan::new(samples, rate_hz)?;
        self.measure(&coefficients, &plan, cancel)
    }

    pub fn tare(&mut self) -> ScaleResult<()> {
        self.tare_with(&CancelToken::new())
    }

    /// Measure the current load and fold it into the offset.
    ///
    /// Each call is a fresh measurement relative to the current offset, so
    /// repeated tares on a still platform converge on the same zero.
    pub fn tare_with(&mut self, cancel: &CancelToken) -> ScaleResult<()> {
        let coefficients = self.require_coefficients()?;
        let plan = self.config.filtered.plan()?;
        let weight = self.measure(&coefficients, &plan, cancel)?;

        self.offset += weight;
        self.state = ScaleState::Tared;
        info!(serial = %self.serial, measured = weight, offset = self.offset, "scale tared");
        Ok(())
    }

    pub fn calibrate<O: Operator + ?Sized>(
        &mut self,
        test_mass: f64,
        operator: &mut O,
    ) -> ScaleResult<CalibrationReport> {
        self.calibrate_with(test_mass, operator, &CancelToken::new())
    }

    /// Run the four-placement calibration protocol with `test_mass`.
    ///
    /// The operator is asked to move the mass to each placement in turn, then
    /// to remove it for the empty-platform baseline. New coefficients are
    /// saved before they are adopted; the offset returns to the configured
    /// default.
    pub fn calibrate_with<O: Operator + ?Sized>(
        &mut self,
        test_mass: f64,
        operator: &mut O,
        cancel: &CancelToken,
    ) -> ScaleResult<CalibrationReport> {
        if !(test_mass.is_finite() && test_mass > 0.0) {
            return Err(ScaleError::InvalidParameter {
                what: format!("test mass must be positive and finite, got {test_mass}"),
            });
        }
        let plan = self.config.calibration.plan()?;
        info!(
            serial = %self.serial,
            test_mass,
            samples = plan.samples_per_channel(),
            window_s = plan.window().as_secs_f64(),
            "calibration started"
        );

        let trials = self.collect_trials(test_mass, operator, &plan, cancel)?;
        let solution = CalibrationSolver::solve_full(&trials)?;
        self.store.save(self.serial, &solution.coefficients)?;

        self.coefficients = Some(solution.coefficients);
        self.offset = self.config.default_offset;
        self.state = ScaleState::Calibrated;
        info!(
            serial = %self.serial,
            coefficients = ?solution.coefficients.gains(),
            bias = solution.bias,
            "calibration saved"
        );

        Ok(CalibrationReport {
            serial: self.serial,
            coefficients: solution.coefficients,
            bias: solution.bias,
            trials: trials
                .iter()
                .map(|t| TrialRecord {
                    readings: t.readings,
                    mass: t.mass,
                })
                .collect(),
        })
    }

    fn collect_trials<O: Operator + ?Sized>(
        &self,
        test_mass: f64,
        operator: &mut O,
        plan: &SamplePlan,
        cancel: &CancelToken,
    ) -> ScaleResult<Vec<Trial>> {
        let sampler = ConcurrentSampler::new(&self.reader);
        let mut trials = Vec::with_capacity(CHANNEL_COUNT + 1);

        for placement in 1..=CHANNEL_COUNT {
            operator.confirm(&OperatorPrompt::PlaceMass {
                placement,
                placements: CHANNEL_COUNT,
                mass: test_mass,
            })?;
            let readings = sampler.sample_scale(plan, cancel)?;
            debug!(placement, readings = ?readings.as_slice(), "calibration trial sampled");
            trials.push(Trial::new(readings, test_mass));
        }

        operator.confirm(&OperatorPrompt::RemoveMass)?;
        let readings = sampler.sample_scale(plan, cancel)?;
        debug!(readings = ?readings.as_slice(), "baseline trial sampled");
        trials.push(Trial::baseline(readings));

        Ok(trials)
    }

    fn measure(
        &self,
        coefficients: &Coefficients,
        plan: &SamplePlan,
        cancel: &CancelToken,
    ) -> ScaleResult<f64> {
        let readings = ConcurrentSampler::new(&self.reader).sample_scale(plan, cancel)?;
        Ok(coefficients.weigh(&readings) - self.offset)
    }

    fn require_coefficients(&self) -> ScaleResult<Coefficients> {
        self.coefficients.ok_or(ScaleError::NotCalibrated)
    }
}

fn attach<R: ChannelReader>(
    reader: &mut R,
    serial: DeviceSerial,
    channel: Channel,
    timeout: Duration,
) -> Result<(), DeviceError> {
    reader.open(serial, channel, timeout)?;
    let interval = reader.min_sample_interval(channel)?;
    reader.set_sample_interval(channel, interval)?;
    debug!(%serial, %channel, ?interval, "channel attached");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OperatorError, SamplingDef};
    use qs_device::ScriptedReader;
    use qs_store::{MemoryCoefficientStore, StoreError, StoreResult};

    const SERIAL: DeviceSerial = DeviceSerial(716692);

    fn fast_config() -> EngineConfig {
        EngineConfig {
            default_offset: 10.0,
            filtered: SamplingDef::new(3, 1000.0),
            calibration: SamplingDef::new(3, 1000.0),
            ..EngineConfig::default()
        }
    }

    fn unit_gains() -> Coefficients {
        Coefficients::new([1.0, 2.0, 3.0, 4.0]).unwrap()
    }

    type TestEngine = WeighingEngine<ScriptedReader, MemoryCoefficientStore>;

    fn calibrated(reader: ScriptedReader) -> TestEngine {
        let store = MemoryCoefficientStore::new().with_row(SERIAL, unit_gains());
        WeighingEngine::open(SERIAL, reader, store, fast_config()).unwrap()
    }

    fn accept_all(_: &OperatorPrompt) -> Result<(), OperatorError> {
        Ok(())
    }

    /// Field trial readings, each held for one three-sample window.
    fn field_reader() -> ScriptedReader {
        const TRIALS: [[f64; CHANNEL_COUNT]; CHANNEL_COUNT + 1] = [
            [0.12, 0.31, 0.09, 0.20],
            [0.30, 0.10, 0.22, 0.18],
            [0.15, 0.19, 0.33, 0.08],
            [0.05, 0.07, 0.06, 0.40],
            [0.0; CHANNEL_COUNT],
        ];
        ScriptedReader::new(std::array::from_fn(|c| {
            TRIALS.iter().flat_map(|trial| [trial[c]; 3]).collect()
        }))
    }

    struct BrokenStore;

    impl CoefficientStore for BrokenStore {
        fn load(&self, serial: DeviceSerial) -> StoreResult<Coefficients> {
            Err(StoreError::NotFound { serial })
        }

        fn save(&mut self, _: DeviceSerial, _: &Coefficients) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn open_attaches_every_channel_at_min_interval() {
        let engine = calibrated(ScriptedReader::constant([0.0; 4]));
        let opened = engine.reader().opened();
        assert_eq!(opened.len(), CHANNEL_COUNT);
        assert!(opened.iter().all(|(serial, _)| *serial == SERIAL));
        for channel in Channel::ALL {
            assert_eq!(
                engine.reader().interval(channel),
                Some(Duration::from_millis(1))
            );
        }
        assert_eq!(engine.state(), ScaleState::Calibrated);
        assert_eq!(engine.offset(), 10.0);
    }

    #[test]
    fn missing_row_starts_uncalibrated() {
        let engine = WeighingEngine::open(
            SERIAL,
            ScriptedReader::constant([0.0; 4]),
            MemoryCoefficientStore::new(),
            fast_config(),
        )
        .unwrap();
        assert_eq!(engine.state(), ScaleState::Uncalibrated);
        assert!(engine.coefficients().is_none());
        assert!(matches!(
            engine.instantaneous_weight(),
            Err(ScaleError::NotCalibrated)
        ));
        assert!(matches!(
            engine.filtered_weight(5, 100.0),
            Err(ScaleError::NotCalibrated)
        ));
    }

    #[test]
    fn refused_attachment_is_reported() {
        let err = WeighingEngine::open(
            SERIAL,
            ScriptedReader::constant([0.0; 4]).refusing_attach(),
            MemoryCoefficientStore::new(),
            fast_config(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ScaleError::AttachmentFailure(_)));
    }

    #[test]
    fn invalid_config_rejected_before_attach() {
        let mut config = fast_config();
        config.filtered.samples_per_channel = 0;
        let err = WeighingEngine::open(
            SERIAL,
            ScriptedReader::constant([0.0; 4]),
            MemoryCoefficientStore::new(),
            config,
        )
        .err()
        .unwrap();
        assert!(matches!(err, ScaleError::Config(_)));
    }

    #[test]
    fn instantaneous_weight_subtracts_offset() {
        let engine = calibrated(ScriptedReader::constant([1.0, 1.0, 1.0, 1.0]));
        let weight = engine.instantaneous_weight().unwrap();
        assert_eq!(weight, 10.0 - 10.0);
        assert_eq!(engine.reader().total_reads(), CHANNEL_COUNT);
    }

    #[test]
    fn filtered_weight_uses_median() {
        let engine = calibrated(ScriptedReader::new([
            vec![1.0, 100.0, 1.0],
            vec![0.0],
            vec![0.0],
            vec![2.0],
        ]));
        let weight = engine.filtered_weight(3, 1000.0).unwrap();
        assert_eq!(weight, 1.0 + 8.0 - 10.0);
    }

    #[test]
    fn bad_plan_rejected_before_io() {
        let engine = calibrated(ScriptedReader::constant([0.0; 4]));
        assert!(matches!(
            engine.filtered_weight(0, 50.0),
            Err(ScaleError::InvalidParameter { .. })
        ));
        assert!(matches!(
            engine.filtered_weight(5, -1.0),
            Err(ScaleError::InvalidParameter { .. })
        ));
        assert_eq!(engine.reader().total_reads(), 0);
    }

    #[test]
    fn tare_zeroes_a_still_platform() {
        let mut engine = calibrated(ScriptedReader::constant([0.5, 0.25, 1.0, 2.0]));
        engine.tare().unwrap();
        assert_eq!(engine.state(), ScaleState::Tared);
        assert_eq!(engine.offset(), 12.0);
        assert_eq!(engine.instantaneous_weight().unwrap(), 0.0);

        engine.tare().unwrap();
        assert_eq!(engine.offset(), 12.0);
    }

    #[test]
    fn tare_requires_calibration() {
        let mut engine = WeighingEngine::open(
            SERIAL,
            ScriptedReader::constant([0.0; 4]),
            MemoryCoefficientStore::new(),
            fast_config(),
        )
        .unwrap();
        assert!(matches!(engine.tare(), Err(ScaleError::NotCalibrated)));
        assert_eq!(engine.offset(), 10.0);
    }

    #[test]
    fn read_failure_during_tare_keeps_offset() {
        let reader = ScriptedReader::constant([1.0; 4]).fail_after(Channel::ALL[2], 1);
        let mut engine = calibrated(reader);
        let err = engine.tare().unwrap_err();
        assert!(matches!(err, ScaleError::Sampling(_)));
        assert_eq!(engine.offset(), 10.0);
        assert_eq!(engine.state(), ScaleState::Calibrated);
    }

    #[test]
    fn non_positive_test_mass_rejected() {
        let mut engine = calibrated(ScriptedReader::constant([0.0; 4]));
        let mut operator = accept_all;
        for mass in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = engine.calibrate(mass, &mut operator).unwrap_err();
            assert!(matches!(err, ScaleError::InvalidParameter { .. }));
        }
        assert_eq!(engine.reader().total_reads(), 0);
    }

    #[test]
    fn operator_sees_every_placement_then_removal() {
        let mut engine = calibrated(ScriptedReader::constant([0.0; 4]));
        let mut prompts = Vec::new();
        let mut operator = |prompt: &OperatorPrompt| -> Result<(), OperatorError> {
            prompts.push(prompt.clone());
            Ok(())
        };
        // Constant readings make every trial identical.
        let err = engine.calibrate(393.8, &mut operator).unwrap_err();
        assert!(matches!(err, ScaleError::Calibration(_)));

        assert_eq!(prompts.len(), CHANNEL_COUNT + 1);
        assert_eq!(
            prompts[0],
            OperatorPrompt::PlaceMass {
                placement: 1,
                placements: CHANNEL_COUNT,
                mass: 393.8
            }
        );
        assert_eq!(prompts[CHANNEL_COUNT], OperatorPrompt::RemoveMass);
    }

    #[test]
    fn declined_prompt_cancels_without_changes() {
        let mut engine = calibrated(ScriptedReader::constant([0.0; 4]));
        engine.tare().unwrap();
        let offset = engine.offset();

        let mut calls = 0;
        let mut operator = |_: &OperatorPrompt| {
            calls += 1;
            if calls == 3 {
                Err(OperatorError::Declined)
            } else {
                Ok(())
            }
        };
        let err = engine.calibrate(100.0, &mut operator).unwrap_err();
        assert!(matches!(err, ScaleError::Cancelled));
        assert_eq!(engine.state(), ScaleState::Tared);
        assert_eq!(engine.offset().to_bits(), offset.to_bits());
        assert_eq!(engine.coefficients(), Some(&unit_gains()));
        assert_eq!(engine.store().save_count(), 0);
    }

    #[test]
    fn cancelled_trial_keeps_previous_calibration() {
        let config = EngineConfig {
            calibration: SamplingDef::new(1000, 50.0),
            ..fast_config()
        };
        let store = MemoryCoefficientStore::new().with_row(SERIAL, unit_gains());
        let reader = ScriptedReader::constant([0.5; 4]);
        let mut engine = WeighingEngine::open(SERIAL, reader, store, config).unwrap();
        engine.tare().unwrap();
        let offset = engine.offset().to_bits();
        let gains = unit_gains().gains().map(f64::to_bits);

        let cancel = CancelToken::new();
        let mut prompts = 0;
        let mut operator = |_: &OperatorPrompt| -> Result<(), OperatorError> {
            prompts += 1;
            Ok(())
        };
        let started = std::time::Instant::now();
        let result = std::thread::scope(|scope| {
            let trigger = cancel.clone();
            scope.spawn(move || {
                std::thread::sleep(Duration::from_millis(60));
                trigger.cancel();
            });
            engine.calibrate_with(393.8, &mut operator, &cancel)
        });

        assert!(matches!(result, Err(ScaleError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(prompts, 1);
        assert_eq!(engine.state(), ScaleState::Tared);
        assert_eq!(engine.offset().to_bits(), offset);
        assert_eq!(engine.coefficients().unwrap().gains().map(f64::to_bits), gains);
        assert_eq!(engine.store().save_count(), 0);
        assert!(engine.reader().total_reads() > CHANNEL_COUNT);
    }

    #[test]
    fn failed_save_keeps_engine_uncalibrated() {
        let mut engine =
            WeighingEngine::open(SERIAL, field_reader(), BrokenStore, fast_config()).unwrap();
        let err = engine.calibrate(393.8, &mut accept_all).unwrap_err();
        assert!(matches!(err, ScaleError::Store(_)));
        assert_eq!(engine.state(), ScaleState::Uncalibrated);
        assert!(engine.coefficients().is_none());
    }

    #[test]
    fn field_trials_calibrate_and_persist() {
        let store = MemoryCoefficientStore::new();
        let mut engine =
            WeighingEngine::open(SERIAL, field_reader(), store, fast_config()).unwrap();
        let report = engine.calibrate(393.8, &mut accept_all).unwrap();

        assert_eq!(engine.state(), ScaleState::Calibrated);
        assert_eq!(engine.offset(), 10.0);
        assert_eq!(engine.coefficients(), Some(&report.coefficients));
        assert_eq!(engine.store().load(SERIAL).unwrap(), report.coefficients);
        assert_eq!(report.trials.len(), CHANNEL_COUNT + 1);
        assert_eq!(report.trials[CHANNEL_COUNT].mass, 0.0);
        assert!(report.bias.abs() < 1e-9);
        for trial in &report.trials[..CHANNEL_COUNT] {
            let fitted = report.coefficients.weigh(&trial.readings) + report.bias;
            assert!((fitted - 393.8).abs() < 1e-6);
        }
    }
}
