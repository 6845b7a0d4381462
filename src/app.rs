//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - writes a synthetic model grid and observation scene
//! - runs the requested density-retrieval mode
//! - prints the run summary and optional curve export
//!
//! Real observations enter through the library API (`RatioMap` plus
//! externally loaded `AstroImage`s); the binary exists to exercise the full
//! pipeline end to end without any external data.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{LinePair, RetrieveOptions, Uncertainty};
use crate::error::AppError;
use crate::fit::fit_cell;
use crate::grid::{ratio_table, read_model_table};
use crate::io::{curve_file, write_curve_json};
use crate::math::linspace;
use crate::qa::{NullQa, QaSink, TextQa};
use crate::ratio::RatioMap;
use crate::synthetic::{SyntheticScene, generate_scene, write_grid};

#[derive(Debug, Parser)]
#[command(name = "densmap", about = "Gas-density retrieval from line-ratio maps (synthetic demo)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Single fixed column density and temperature over the whole map.
    Single(DemoArgs),
    /// Per-pixel retrieval from column-density and temperature maps.
    Map(DemoArgs),
    /// Per-pixel retrieval with the column density derived from abundance.
    Abundance(DemoArgs),
}

#[derive(Debug, Args)]
struct DemoArgs {
    /// Directory where the synthetic model grid is written.
    #[arg(long, default_value = "demo-grid")]
    grid_dir: PathBuf,

    /// Side length of the synthetic square map.
    #[arg(long, default_value_t = 32)]
    size: usize,

    /// Seed for the synthetic scene and grid noise.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Polynomial order of the ratio-vs-density fit.
    #[arg(long, default_value_t = 2)]
    poly_order: usize,

    /// Gaussian scatter added to the tabulated model ratios.
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// Output linear density instead of log10.
    #[arg(long)]
    linear: bool,

    /// Suppress QA output.
    #[arg(long)]
    quiet: bool,

    /// Write the fitted curve of the demo cell as JSON (single mode only).
    #[arg(long)]
    export_curve: Option<PathBuf>,
}

const COL_DENS_LABELS: [&str; 2] = ["1p0", "2p5"];
const T_KINS: [f64; 2] = [10.0, 20.0];
const FWHM_LABEL: &str = "1p0";

/// Entry point for the `densmap` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Single(args) => run_single(&args),
        Command::Map(args) => run_map(&args, false),
        Command::Abundance(args) => run_map(&args, true),
    }
}

fn demo_pair() -> LinePair {
    LinePair::new("hcn", "10-9", "9-8")
}

fn demo_options(args: &DemoArgs) -> RetrieveOptions {
    RetrieveOptions {
        poly_order: args.poly_order,
        log_output: !args.linear,
        ..RetrieveOptions::default()
    }
}

fn qa_sink(args: &DemoArgs) -> Box<dyn QaSink> {
    if args.quiet {
        Box::new(NullQa)
    } else {
        Box::new(TextQa)
    }
}

fn build_ratio_map(scene: &SyntheticScene) -> RatioMap {
    RatioMap::new(
        &scene.data_1,
        &scene.data_2,
        Some(Uncertainty::Uniform(0.05, 0.05)),
    )
}

fn run_single(args: &DemoArgs) -> Result<(), AppError> {
    let pair = demo_pair();
    let log_dens = linspace(2.0, 8.0, 13);

    // One (temperature, FWHM) subdirectory holding the single cell's files.
    let cell_dir = args.grid_dir.join(format!("T=10K-FWHM={FWHM_LABEL}"));
    write_grid(&cell_dir, &pair, &["1p0"], &[10.0], &log_dens, args.noise, args.seed)?;

    let scene = generate_scene((args.size, args.size), &[1.0], &[10.0], (2.0, 8.0), args.seed);
    let map = build_ratio_map(&scene);

    let qa = qa_sink(args);
    let (retrieval, stats) = map.density_single_cell(
        &pair,
        &args.grid_dir,
        "1p0",
        "10",
        FWHM_LABEL,
        &demo_options(args),
        qa.as_ref(),
    )?;

    println!("{}", crate::report::format_run_summary("single cell", &retrieval, &stats));

    if let Some(path) = &args.export_curve {
        let table_1 = read_model_table(&cell_dir.join(format!("{}_{}_1p0.dat", pair.mol, pair.line_1)))?;
        let table_2 = read_model_table(&cell_dir.join(format!("{}_{}_1p0.dat", pair.mol, pair.line_2)))?;
        let rt = ratio_table(&table_1, &table_2);
        let cell = rt.cell(1.0, 10.0);
        let (curve, _) = fit_cell(&cell, args.poly_order)?;
        write_curve_json(path, &curve_file(&pair, &cell, &curve))?;
        println!("Wrote fitted curve to {}", path.display());
    }

    Ok(())
}

fn run_map(args: &DemoArgs, via_abundance: bool) -> Result<(), AppError> {
    let pair = demo_pair();
    let log_dens = linspace(2.0, 8.0, 13);
    write_grid(
        &args.grid_dir,
        &pair,
        &COL_DENS_LABELS,
        &T_KINS,
        &log_dens,
        args.noise,
        args.seed,
    )?;

    let col_dens_vals: Vec<f64> = COL_DENS_LABELS
        .iter()
        .map(|l| l.replace('p', ".").parse().unwrap_or(f64::NAN))
        .collect();
    let scene = generate_scene(
        (args.size, args.size),
        &col_dens_vals,
        &T_KINS,
        (2.0, 8.0),
        args.seed,
    );
    let map = build_ratio_map(&scene);

    let qa = qa_sink(args);
    let opts = demo_options(args);

    let (retrieval, stats, label) = if via_abundance {
        // Pretend the column-density map is a total map scaled up by the
        // inverse abundance, then let the engine apply the conversion.
        let abundance = 1e-8;
        let total = scene.col_dens.mol_col_dens(1.0 / abundance);
        let (r, s) = map.density_from_abundance(
            &pair,
            &args.grid_dir,
            abundance,
            &total,
            &scene.t_dust,
            0.0,
            &opts,
            qa.as_ref(),
        )?;
        (r, s, "per-pixel via abundance")
    } else {
        let (r, s) = map.density_from_col_dens(
            &pair,
            &args.grid_dir,
            &scene.col_dens,
            &scene.t_dust,
            0.0,
            &opts,
            qa.as_ref(),
        )?;
        (r, s, "per-pixel via column density")
    };

    println!("{}", crate::report::format_run_summary(label, &retrieval, &stats));
    Ok(())
}
