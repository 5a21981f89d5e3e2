//! Synthetic displacement sensor
//!
//! Writes one decimal sample per line to stdout: a sum of sine tones on a DC
//! offset, with optional gaussian noise, injected spikes and garbage lines so
//! the spike filter and the line parser get exercised too.
//!
//! # Usage
//! ```bash
//! ./simulate --freq 12.5 --freq 40 --sample-rate 3000 | ./serial-spectrum --stdin
//! ./simulate --freq 10 --sample-rate 50 --seconds 4 --seed 7 > capture.txt
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::io::{self, BufWriter, Write};
use std::time::{Duration, Instant};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "simulate")]
#[command(about = "Synthetic serial displacement data for serial-spectrum testing")]
#[command(version)]
struct Args {
    /// Tone frequency in Hz (repeat for several tones)
    #[arg(short, long = "freq", default_values_t = vec![12.5])]
    freqs: Vec<f64>,

    /// Amplitude of each tone
    #[arg(short, long, default_value_t = 1.0)]
    amplitude: f64,

    /// DC offset added to every sample
    #[arg(long, default_value_t = 20.0)]
    offset: f64,

    /// Standard deviation of additive gaussian noise
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// Inject a spike (offset + 50) every N samples, 0 = never
    #[arg(long, default_value_t = 0)]
    spike_every: u64,

    /// Emit an unparseable line every N samples, 0 = never
    #[arg(long, default_value_t = 0)]
    garbage_every: u64,

    /// Output sample rate in Hz (0 = as fast as stdout accepts)
    #[arg(long, default_value_t = 3000.0)]
    sample_rate: f64,

    /// Stop after this many seconds of signal time (0 = run until killed)
    #[arg(long, default_value_t = 0.0)]
    seconds: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Signal model
// ============================================================================

struct SignalGenerator {
    freqs: Vec<f64>,
    amplitude: f64,
    offset: f64,
    /// Time step of the signal model; also used for unpaced output
    dt: f64,
    noise: Option<Normal<f64>>,
    rng: StdRng,
}

impl SignalGenerator {
    fn new(args: &Args, model_rate: f64) -> Result<Self> {
        let noise = if args.noise > 0.0 {
            Some(Normal::new(0.0, args.noise).context("Invalid --noise")?)
        } else {
            None
        };
        let rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            freqs: args.freqs.clone(),
            amplitude: args.amplitude,
            offset: args.offset,
            dt: 1.0 / model_rate,
            noise,
            rng,
        })
    }

    fn sample(&mut self, index: u64) -> f64 {
        let t = index as f64 * self.dt;
        let tones: f64 = self
            .freqs
            .iter()
            .map(|f| self.amplitude * (2.0 * PI * f * t).sin())
            .sum();
        let noise = match &self.noise {
            Some(dist) => dist.sample(&mut self.rng),
            None => 0.0,
        };
        self.offset + tones + noise
    }
}

fn every(n: u64, index: u64) -> bool {
    n > 0 && index > 0 && index % n == 0
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    if args.freqs.iter().any(|f| !f.is_finite() || *f < 0.0) {
        bail!("--freq values must be finite and non-negative");
    }
    if !args.sample_rate.is_finite() || args.sample_rate < 0.0 {
        bail!("--sample-rate must be >= 0");
    }
    if !args.seconds.is_finite() || args.seconds < 0.0 {
        bail!("--seconds must be >= 0");
    }

    // Unpaced output still needs a signal-time step for the tones.
    let paced = args.sample_rate > 0.0;
    let model_rate = if paced {
        args.sample_rate
    } else {
        1_000.0
    };
    let mut generator = SignalGenerator::new(&args, model_rate)?;

    let total = if args.seconds > 0.0 {
        Some((args.seconds * model_rate).round() as u64)
    } else {
        None
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let start = Instant::now();
    let mut index = 0u64;

    loop {
        if total.is_some_and(|n| index >= n) {
            break;
        }

        let line = if every(args.garbage_every, index) {
            "ERR\r".to_string()
        } else if every(args.spike_every, index) {
            format!("{:.4}", args.offset + 50.0)
        } else {
            format!("{:.4}", generator.sample(index))
        };

        if let Err(e) = writeln!(out, "{line}") {
            // Reader went away (e.g. the analyzer was stopped).
            if e.kind() == io::ErrorKind::BrokenPipe {
                return Ok(());
            }
            return Err(e.into());
        }
        index += 1;

        if paced {
            out.flush().ok();
            let due = start + Duration::from_secs_f64(index as f64 / args.sample_rate);
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
    }

    out.flush()?;
    Ok(())
}
