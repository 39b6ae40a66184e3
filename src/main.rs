use clap::Parser;
use log::{info, warn};
use quire::{RenderJob, parse_param};
use std::path::PathBuf;
use std::process::ExitCode;

/// Fill PDF form templates with JSON data.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// XML layout configuration
    #[arg(short, long)]
    config: PathBuf,

    /// JSON data: one object or an array of objects
    #[arg(short, long)]
    data: PathBuf,

    /// PDF file to write
    #[arg(short, long)]
    output: PathBuf,

    /// Directory that template, image and import names resolve against
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// User parameter override, repeatable
    #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = param)]
    params: Vec<(String, String)>,
}

fn param(arg: &str) -> Result<(String, String), String> {
    parse_param(arg).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut job = RenderJob::new(&args.config, &args.data, &args.output);
    if let Some(dir) = &args.base_dir {
        job = job.with_base_dir(dir);
    }
    for (name, value) in args.params {
        job = job.with_param(name, value);
    }

    match job.run() {
        Ok(report) => {
            for warning in &report.warnings {
                warn!("{}", warning);
            }
            for grid in &report.summary.truncated_grids {
                warn!(
                    "Entity {}: '{}' on page '{}' dropped {} records",
                    grid.entity + 1,
                    grid.grid,
                    grid.page,
                    grid.dropped
                );
            }
            info!(
                "{} entities, {} pages, {} appended",
                report.summary.entities, report.summary.pages, report.summary.appended_pages
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("quire: {}", e);
            ExitCode::FAILURE
        }
    }
}
