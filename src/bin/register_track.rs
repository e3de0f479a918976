//! Offline track registration.
//!
//! Fits the similarity transform that places a track's telemetry frame onto
//! its geographic outline and writes it as a transform file for the viewer.
//!
//! ```text
//! register-track --corners corners.json --geo track.geojson --out transform.json
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, LevelFilter};

use track_overlay::{
    register, OverlayError, Polyline, ReferenceOutline, ReferencePointSet, RegistrationConfig,
    Result, TransformConfig,
};

/// Register corner reference points onto a geographic track outline
#[derive(Parser, Debug)]
#[command(name = "register-track")]
#[command(about = "Fit the telemetry-to-map similarity transform for a track", long_about = None)]
struct Args {
    /// Reference points in the telemetry frame ({X, Y, CornerNumber?})
    #[arg(long)]
    corners: PathBuf,

    /// Track outline (GeoJSON, first feature's coordinates)
    #[arg(long)]
    geo: PathBuf,

    /// Output transform file
    #[arg(long)]
    out: PathBuf,

    /// Maximum registration iterations
    #[arg(long, default_value = "20")]
    max_iterations: u32,

    /// Convergence tolerance on the mean squared residual
    #[arg(long, default_value = "1e-6")]
    tolerance: f64,

    /// Free-form notes stored in the transform file
    #[arg(long, default_value = "")]
    notes: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn insufficient(path: &Path, what: &str, found: usize, minimum: usize) -> OverlayError {
    OverlayError::InsufficientPoints {
        context: format!("{} in {}", what, path.display()),
        point_count: found,
        minimum_required: minimum,
    }
}

fn run(args: &Args) -> Result<()> {
    let corners = ReferencePointSet::load(&args.corners)?;
    if corners.is_empty() {
        return Err(insufficient(&args.corners, "reference points", 0, 1));
    }
    let outline = ReferenceOutline::load(&args.geo)?;
    if outline.len() < Polyline::MIN_POINTS {
        return Err(insufficient(&args.geo, "track outline", outline.len(), Polyline::MIN_POINTS));
    }
    info!(
        "Loaded {} reference points from {} and {} outline vertices from {}",
        corners.len(),
        args.corners.display(),
        outline.len(),
        args.geo.display()
    );

    let config = RegistrationConfig {
        max_iterations: args.max_iterations,
        convergence_tolerance: args.tolerance,
        ..RegistrationConfig::default()
    };
    let report = register(&corners.positions(), &outline.projected()?, &config)?;

    TransformConfig::from_report(&report, args.notes.clone()).save(&args.out)?;

    println!(
        "s={:.6} angle={:.6} rad, mean error {:.3} m over {} points ({} iterations{})",
        report.transform.s,
        report.transform.angle(),
        report.mean_error_m,
        report.point_count,
        report.iterations,
        if report.converged { "" } else { ", not converged" }
    );
    println!("Wrote {}", args.out.display());
    Ok(())
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
