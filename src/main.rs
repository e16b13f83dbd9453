//! Nodal - circuit simulation from the command line
//!
//! Reads a topology JSON file, runs the requested analysis and writes the
//! results to stdout.
//!
//! # Usage
//!
//! ```bash
//! nodal divider.json op
//! nodal rl.json tran --dt 1e-4 --t-stop 0.05 --format csv
//! nodal filter.json ac --frequency 1000
//! RUST_LOG=debug nodal rectifier.json tran --dt 1e-5 --t-stop 0.04
//! ```

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use nodal_core::{
    error::{CircuitError, Result},
    Simulator, SimulatorConfig, TimeSeries, Topology, Transient, TransientParams,
};

/// Circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology file (.json)
    #[arg(value_name = "TOPOLOGY_FILE")]
    topology_file: PathBuf,

    #[command(subcommand)]
    analysis: Analysis,

    /// Maximum Newton-Raphson iterations per solve
    #[arg(long, default_value_t = nodal_core::solver::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Absolute convergence tolerance in volts
    #[arg(long, default_value_t = nodal_core::solver::DEFAULT_ABS_TOL)]
    abs_tol: f64,

    /// Relative convergence tolerance
    #[arg(long, default_value_t = nodal_core::solver::DEFAULT_REL_TOL)]
    rel_tol: f64,

    /// Reject terminals with no connection
    #[arg(long)]
    strict: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(Subcommand, Debug)]
enum Analysis {
    /// DC operating point
    Op,
    /// Fixed-step transient analysis
    Tran {
        /// Time step in seconds
        #[arg(long)]
        dt: f64,

        /// End time in seconds
        #[arg(long)]
        t_stop: f64,

        /// Start from the DC operating point instead of the stored state
        #[arg(long, conflicts_with = "uic")]
        op_start: bool,

        /// Start from the stored component state (default)
        #[arg(long)]
        uic: bool,
    },
    /// Small-signal solve at a single frequency
    Ac {
        /// Frequency in Hz
        #[arg(long)]
        frequency: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
}

fn write_output(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|e| CircuitError::OutputError {
            message: e.to_string(),
        })
}

fn render_series(series: &TimeSeries, format: Format) -> Result<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(series)?),
        Format::Csv => Ok(series.to_csv()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Load and build the circuit
    let topology = Topology::from_file(&args.topology_file)?;
    let config = SimulatorConfig::new()
        .with_max_iterations(args.max_iterations)
        .with_abs_tol(args.abs_tol)
        .with_rel_tol(args.rel_tol)
        .with_strict(args.strict);
    let mut simulator = Simulator::from_topology(&topology, config)?;

    let text = match args.analysis {
        Analysis::Op => {
            let sample = simulator.dc_operating_point()?;
            let series = TimeSeries {
                samples: vec![sample],
            };
            render_series(&series, args.format)?
        }
        Analysis::Tran {
            dt,
            t_stop,
            op_start,
            uic,
        } => {
            let params = TransientParams::new(dt, t_stop).with_operating_point(op_start && !uic);
            let mut run = Transient::new(simulator, params)?;
            render_series(run.run_to_end()?, args.format)?
        }
        Analysis::Ac { frequency } => {
            // Linearize diodes at the operating point first
            simulator.dc_operating_point()?;
            let solution = simulator.ac_solve(frequency)?;
            let phasors = solution.phasors();
            match args.format {
                Format::Json => serde_json::to_string_pretty(&phasors)?,
                Format::Csv => {
                    let mut out = String::from("key,magnitude,phase_deg\n");
                    for (key, p) in &phasors {
                        out.push_str(&format!("{key},{:e},{:e}\n", p.magnitude, p.phase));
                    }
                    out
                }
            }
        }
    };

    write_output(&text)?;
    write_output("\n")
}
