//! SkyKappa CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use sk_catalog::{write_catalog_parquet, ParquetCatalog};
use sk_core::{CatalogMeta, SourcePlane};
use sk_dist::{run_group, SelfComm};
use sk_lens::cosmology::{comoving_distance, PLANCK15_OM};
use sk_pipeline::{run, write_maps, PipelineConfig};

#[derive(Parser)]
#[command(name = "skykappa")]
#[command(about = "SkyKappa - distributed weak-lensing convergence maps")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build kappa maps from a light-cone catalog
    Map {
        /// Output directory for map artifacts
        output: PathBuf,

        /// Source light-cone catalog (Parquet)
        source: PathBuf,

        /// One or more source redshifts
        #[arg(required = true)]
        zs: Vec<f64>,

        /// Minimum lens redshift
        #[arg(long, default_value = "0.01")]
        zlmin: f64,

        /// Maximum lens redshift. Defaults to the largest source redshift.
        #[arg(long)]
        zlmax: Option<f64>,

        /// Lens redshift step
        #[arg(long, default_value = "0.05")]
        zstep: f64,

        /// HEALPix resolution parameter
        #[arg(long, default_value = "256")]
        nside: u64,

        /// In-process worker ranks
        #[arg(long, default_value = "1")]
        workers: usize,
    },

    /// Generate a synthetic light-cone catalog
    Synth {
        /// Output catalog path (Parquet)
        output: PathBuf,

        /// Number of particles
        #[arg(long, default_value = "100000")]
        particles: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Minimum light-cone redshift
        #[arg(long, default_value = "0.05")]
        zmin: f64,

        /// Maximum light-cone redshift
        #[arg(long, default_value = "1.0")]
        zmax: f64,

        /// Particle mesh cells per side (metadata)
        #[arg(long, default_value = "256")]
        nc: f64,

        /// Simulation box side in Mpc/h (metadata)
        #[arg(long, default_value = "512")]
        box_size: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Map { output, source, zs, zlmin, zlmax, zstep, nside, workers } => {
            cmd_map(&output, &source, &zs, zlmin, zlmax, zstep, nside, workers)
        }
        Commands::Synth { output, particles, seed, zmin, zmax, nc, box_size } => {
            cmd_synth(&output, particles, seed, zmin, zmax, nc, box_size)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_map(
    output: &PathBuf,
    source: &PathBuf,
    zs: &[f64],
    zlmin: f64,
    zlmax: Option<f64>,
    zstep: f64,
    nside: u64,
    workers: usize,
) -> Result<()> {
    if nside == 0 {
        anyhow::bail!("nside must be >= 1");
    }
    if workers == 0 {
        anyhow::bail!("workers must be >= 1");
    }
    let zlmax = zlmax.unwrap_or_else(|| zs.iter().copied().fold(f64::MIN, f64::max));

    let planes: Vec<SourcePlane> =
        zs.iter().map(|&z| SourcePlane::new(z, comoving_distance(z))).collect();
    let cfg = PipelineConfig { nside, planes, zlmin, zlmax, zstep };
    cfg.validate()?;

    tracing::info!(source = %source.display(), workers, "building kappa maps");

    if workers == 1 {
        let catalog = ParquetCatalog::open(source)?;
        let result = run(&cfg, &catalog, &SelfComm)?;
        let written = write_maps(output, &result, &SelfComm)?;
        tracing::info!(artifacts = written.len(), "run complete");
    } else {
        let written = run_group(workers, |comm| {
            let catalog = ParquetCatalog::open(source)?;
            let result = run(&cfg, &catalog, &comm)?;
            write_maps(output, &result, &comm)
        })?;
        tracing::info!(artifacts = written[0].len(), "run complete");
    }
    Ok(())
}

/// Piecewise-linear inverse of the comoving-distance relation, built once
/// from a cumulative trapezoid pass.
struct DistanceTable {
    entries: Vec<(f64, f64)>, // (distance, redshift), ascending
}

impl DistanceTable {
    fn build(zmax: f64) -> Self {
        const DZ: f64 = 1.0e-3;
        const HUBBLE_DISTANCE: f64 = 2997.92458;
        let n = (zmax / DZ).ceil() as usize;
        let efunc =
            |z: f64| (PLANCK15_OM * (1.0 + z).powi(3) + (1.0 - PLANCK15_OM)).sqrt();
        let mut entries = Vec::with_capacity(n + 1);
        entries.push((0.0, 0.0));
        let mut d = 0.0;
        let mut prev = 1.0;
        for i in 1..=n {
            let z = zmax * i as f64 / n as f64;
            let next = 1.0 / efunc(z);
            d += 0.5 * (prev + next) * (zmax / n as f64) * HUBBLE_DISTANCE;
            prev = next;
            entries.push((d, z));
        }
        Self { entries }
    }

    fn redshift_at(&self, d: f64) -> f64 {
        let i = self.entries.partition_point(|&(dist, _)| dist < d);
        if i == 0 {
            return 0.0;
        }
        if i >= self.entries.len() {
            return self.entries[self.entries.len() - 1].1;
        }
        let (d0, z0) = self.entries[i - 1];
        let (d1, z1) = self.entries[i];
        z0 + (z1 - z0) * (d - d0) / (d1 - d0)
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_synth(
    output: &PathBuf,
    particles: usize,
    seed: u64,
    zmin: f64,
    zmax: f64,
    nc: f64,
    box_size: f64,
) -> Result<()> {
    if !(zmax > zmin && zmin > 0.0) {
        anyhow::bail!("need 0 < zmin < zmax");
    }

    let table = DistanceTable::build(zmax * 1.01);
    let rmin = comoving_distance(zmin);
    let rmax = comoving_distance(zmax);

    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut positions = Vec::with_capacity(particles);
    let mut aemit = Vec::with_capacity(particles);
    for _ in 0..particles {
        // Uniform in comoving volume of the shell, isotropic direction.
        let r = rng.random_range(rmin.powi(3)..rmax.powi(3)).cbrt();
        let cos_theta: f64 = rng.random_range(-1.0..1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
        let phi = rng.random_range(0.0..2.0 * std::f64::consts::PI);
        positions.push([r * sin_theta * phi.cos(), r * sin_theta * phi.sin(), r * cos_theta]);
        aemit.push(1.0 / (1.0 + table.redshift_at(r)));
    }

    // Index edges bracketing the generated scale-factor range.
    let amin = 1.0 / (1.0 + zmax) * 0.999;
    let amax = (1.0 / (1.0 + zmin) * 1.001).min(1.0);
    let edges: Vec<f64> = (0..=64).map(|i| amin + (amax - amin) * i as f64 / 64.0).collect();

    let meta =
        CatalogMeta { om: PLANCK15_OM, nc, box_size, particle_fraction: 1.0 };
    write_catalog_parquet(output, positions, aemit, meta, edges)?;

    tracing::info!(path = %output.display(), particles, "catalog written");
    println!("wrote {particles} particles to {}", output.display());
    Ok(())
}
