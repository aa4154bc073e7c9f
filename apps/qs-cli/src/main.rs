mod operator;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use qs_core::DeviceSerial;
use qs_device::{DeviceError, LoadPosition, SimulatedScale};
use qs_engine::{EngineConfig, ScaleError, WeighingEngine, load_yaml};
use qs_store::CsvCoefficientStore;
use tracing::{info, warn};

use crate::operator::BenchOperator;

type Engine = WeighingEngine<SimulatedScale, CsvCoefficientStore>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Scale(#[from] ScaleError),

    #[error("Simulator error: {0}")]
    Device(#[from] DeviceError),

    #[error("Failed to render report: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "qs-cli")]
#[command(about = "QuadScale CLI - four-cell scale calibration and weighing", long_about = None)]
struct Cli {
    /// Device serial number
    #[arg(long, default_value_t = DeviceSerial(716692))]
    serial: DeviceSerial,
    /// Coefficient table (CSV, one row per serial)
    #[arg(long, default_value = "scale_coefficients.csv")]
    store: PathBuf,
    /// Engine config YAML (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Std deviation of simulated read noise, in ratio units
    #[arg(long, default_value_t = 2e-8)]
    noise: f64,
    /// Seed for the simulated noise
    #[arg(long, default_value_t = 1)]
    seed: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored calibration for the serial
    Show,
    /// Run the interactive four-placement calibration
    Calibrate {
        /// Known test mass (defaults to the configured one)
        #[arg(long)]
        test_mass: Option<f64>,
        /// Tare the empty platform after calibrating
        #[arg(long)]
        tare: bool,
        /// Do not wait for Enter between trials
        #[arg(long)]
        yes: bool,
    },
    /// Tare, then print one filtered weight
    Weigh {
        /// Samples per channel (defaults to the configured filtered protocol)
        #[arg(long)]
        samples: Option<usize>,
        /// Sample rate in Hz
        #[arg(long)]
        rate: Option<f64>,
        /// Skip the tare
        #[arg(long)]
        no_tare: bool,
        /// Simulated mass placed at the center after taring
        #[arg(long, default_value_t = 0.0)]
        load: f64,
    },
    /// Tare, then stream instantaneous weights
    Live {
        /// Number of readings to print
        #[arg(long, default_value_t = 20)]
        count: usize,
        /// Delay between readings
        #[arg(long, default_value_t = 250)]
        interval_ms: u64,
        /// Simulated mass placed at the center after taring
        #[arg(long, default_value_t = 0.0)]
        load: f64,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_yaml(path).map_err(ScaleError::from)?,
        None => EngineConfig::default(),
    };
    let sim = if cli.noise > 0.0 {
        SimulatedScale::bench().with_noise(cli.noise, cli.seed)?
    } else {
        SimulatedScale::bench()
    };
    let engine = open_engine(cli.serial, &cli.store, sim.clone(), config)?;

    match cli.command {
        Commands::Show => cmd_show(&engine, &cli.store),
        Commands::Calibrate {
            test_mass,
            tare,
            yes,
        } => cmd_calibrate(engine, sim, test_mass, tare, !yes),
        Commands::Weigh {
            samples,
            rate,
            no_tare,
            load,
        } => cmd_weigh(engine, &sim, samples, rate, !no_tare, load),
        Commands::Live {
            count,
            interval_ms,
            load,
        } => cmd_live(engine, &sim, count, Duration::from_millis(interval_ms), load),
    }
}

fn open_engine(
    serial: DeviceSerial,
    store_path: &Path,
    sim: SimulatedScale,
    config: EngineConfig,
) -> CliResult<Engine> {
    info!(%serial, store = %store_path.display(), "opening simulated scale");
    let store = CsvCoefficientStore::new(store_path);
    Ok(WeighingEngine::open(serial, sim, store, config)?)
}

fn cmd_show(engine: &Engine, store_path: &Path) -> CliResult<()> {
    println!("Serial:  {}", engine.serial());
    println!("Store:   {}", store_path.display());
    println!("State:   {:?}", engine.state());
    println!("Offset:  {}", engine.offset());
    match engine.coefficients() {
        Some(coefficients) => {
            for (c, gain) in coefficients.gains().iter().enumerate() {
                println!("  c{c} = {gain}");
            }
        }
        None => println!("No coefficients stored; run `qs-cli calibrate`"),
    }
    Ok(())
}

fn cmd_calibrate(
    mut engine: Engine,
    sim: SimulatedScale,
    test_mass: Option<f64>,
    tare: bool,
    interactive: bool,
) -> CliResult<()> {
    let test_mass = test_mass.unwrap_or(engine.config().test_mass);
    let window = engine.config().calibration;
    println!(
        "Calibrating {} with a {test_mass} test mass ({} samples/channel at {} Hz per trial)",
        engine.serial(),
        window.samples_per_channel,
        window.sample_rate_hz
    );

    let mut operator = BenchOperator::new(sim, interactive);
    let report = engine.calibrate(test_mass, &mut operator).inspect_err(|e| {
        warn!(serial = %engine.serial(), error = %e, "calibration aborted");
    })?;
    println!("✓ Calibration saved");
    print!("{}", serde_yaml::to_string(&report)?);

    if tare {
        engine.tare()?;
        println!("✓ Tared, offset = {}", engine.offset());
    }
    Ok(())
}

fn cmd_weigh(
    mut engine: Engine,
    sim: &SimulatedScale,
    samples: Option<usize>,
    rate: Option<f64>,
    tare: bool,
    load: f64,
) -> CliResult<()> {
    require_calibrated(&engine)?;
    if tare {
        engine.tare()?;
        println!("Tared, offset = {:.3}", engine.offset());
    }
    place_load(sim, load);

    let filtered = engine.config().filtered;
    let samples = samples.unwrap_or(filtered.samples_per_channel);
    let rate = rate.unwrap_or(filtered.sample_rate_hz);
    info!(samples, rate, load, "filtered weighing");
    let weight = engine.filtered_weight(samples, rate)?;
    println!("Weight: {weight:.3}");
    Ok(())
}

fn cmd_live(
    mut engine: Engine,
    sim: &SimulatedScale,
    count: usize,
    interval: Duration,
    load: f64,
) -> CliResult<()> {
    require_calibrated(&engine)?;
    engine.tare()?;
    place_load(sim, load);
    info!(count, interval_ms = interval.as_millis() as u64, "streaming live weights");

    for i in 0..count {
        let weight = engine.instantaneous_weight()?;
        println!("{:>4}  {weight:>10.3}", i + 1);
        if i + 1 < count {
            thread::sleep(interval);
        }
    }
    Ok(())
}

fn require_calibrated(engine: &Engine) -> CliResult<()> {
    if engine.state().is_calibrated() {
        Ok(())
    } else {
        Err(ScaleError::NotCalibrated.into())
    }
}

fn place_load(sim: &SimulatedScale, load: f64) {
    if load != 0.0 {
        sim.place(load, LoadPosition::Center);
    }
}
