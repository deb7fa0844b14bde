//! Topobatch CLI - Batch Processing of Surface Topography
//!
//! This is a demonstration CLI for the topobatch library, driving the
//! bundled `Heightmap` data object.

use anyhow::{bail, Context, Result};
use topobatch::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        return Ok(());
    }

    match args[1].as_str() {
        "list" => list_parameters(),
        "process" => {
            if args.len() < 3 {
                bail!("usage: {} process <glob> [options]", args[0]);
            }
            process_files(&args[2..])?;
        }
        "help" | "--help" | "-h" => print_usage(&args[0]),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage(&args[0]);
        }
    }
    Ok(())
}

fn print_usage(program: &str) {
    println!("Usage: {program} <command> [options]");
    println!();
    println!("Commands:");
    println!("  list                 List the published roughness parameters");
    println!("  process <glob> [options]  Process matching measurement files");
    println!("  help                 Show this help message");
    println!();
    println!("Process options:");
    println!("  --level              Subtract the least-squares mean plane");
    println!("  --zero               Shift the height origin to the lowest point");
    println!("  --center             Remove the mean height");
    println!("  --threshold <t>      Discard points below a material-ratio threshold");
    println!("  --filter <kind> <cutoff>  Apply lowpass/highpass filtering");
    println!("  --align <x|y>        Align the texture lay with an axis");
    println!("  --zoom <factor>      Crop the central 1/factor region");
    println!("  --params <a,b,...>   Parameters to compute (default: Sa,Sq,Sz)");
    println!("  --all-params         Compute every published parameter");
    println!("  --metadata <csv>     Merge per-file metadata on the 'file' column");
    println!("  --save <csv>         Write the result table to a CSV file");
    println!("  --sequential         Process files one at a time, in order");
    println!("  --threads <n>        Limit the worker pool size");
}

fn list_parameters() {
    let catalog = Heightmap::parameters();
    println!("Published parameters ({} total):", catalog.len());
    println!();
    for spec in catalog.specs() {
        if spec.is_multi_valued() {
            println!(
                "  • {} [{}] - {}",
                spec.identifier,
                spec.labels.join(", "),
                spec.description
            );
        } else {
            println!("  • {} - {}", spec.identifier, spec.description);
        }
    }
}

fn process_files(args: &[String]) -> Result<()> {
    let pattern = &args[0];
    let files: Vec<_> = glob::glob(pattern)
        .with_context(|| format!("invalid glob pattern '{pattern}'"))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read matching files")?;
    if files.is_empty() {
        bail!("no files match '{pattern}'");
    }

    let mut batch = Batch::<Heightmap>::new(files);
    let mut params: Vec<String> = Vec::new();
    let mut all_params = false;
    let mut parallel = true;
    let mut threads = 0usize;
    let mut save_to: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--level" => {
                batch.level();
                i += 1;
            }
            "--zero" => {
                batch.zero();
                i += 1;
            }
            "--center" => {
                batch.center();
                i += 1;
            }
            "--threshold" if i + 1 < args.len() => {
                batch.threshold(args[i + 1].parse().context("invalid threshold")?);
                i += 2;
            }
            "--filter" if i + 2 < args.len() => {
                let kind = match args[i + 1].as_str() {
                    "lowpass" => FilterKind::Lowpass,
                    "highpass" => FilterKind::Highpass,
                    other => bail!("unknown filter kind '{other}'"),
                };
                batch.filter(kind, args[i + 2].parse().context("invalid cutoff")?, None);
                i += 3;
            }
            "--align" if i + 1 < args.len() => {
                let axis = match args[i + 1].as_str() {
                    "x" => Axis::X,
                    "y" => Axis::Y,
                    other => bail!("unknown axis '{other}'"),
                };
                batch.align(axis);
                i += 2;
            }
            "--zoom" if i + 1 < args.len() => {
                batch.zoom(args[i + 1].parse().context("invalid zoom factor")?);
                i += 2;
            }
            "--params" if i + 1 < args.len() => {
                params.extend(args[i + 1].split(',').map(str::to_string));
                i += 2;
            }
            "--all-params" => {
                all_params = true;
                i += 1;
            }
            "--metadata" if i + 1 < args.len() => {
                batch
                    .additional_data_csv(&args[i + 1])
                    .with_context(|| format!("failed to load metadata from {}", args[i + 1]))?;
                i += 2;
            }
            "--save" if i + 1 < args.len() => {
                save_to = Some(args[i + 1].clone());
                i += 2;
            }
            "--sequential" => {
                parallel = false;
                i += 1;
            }
            "--threads" if i + 1 < args.len() => {
                threads = args[i + 1].parse().context("invalid thread count")?;
                i += 2;
            }
            other => bail!("unknown option '{other}'"),
        }
    }

    if all_params {
        batch.roughness_parameters(None)?;
    } else {
        if params.is_empty() {
            params = vec!["Sa".to_string(), "Sq".to_string(), "Sz".to_string()];
        }
        for param in &params {
            batch
                .parameter(param)
                .with_context(|| format!("unknown parameter '{param}'"))?;
        }
    }

    println!("⚙️  Processing {} files...", batch.filepaths().len());
    let mut options = ExecuteOptions::new()
        .with_parallel(parallel)
        .with_max_threads(threads)
        .with_progress(|update| match update {
            ProgressUpdate::TaskCompleted {
                file,
                completed,
                total,
                ..
            } => {
                println!("   • [{completed}/{total}] {file}");
            }
            ProgressUpdate::Error { file, message } => {
                eprintln!("❌ {}: {message}", file.unwrap_or_default());
            }
            _ => {}
        });
    if let Some(path) = &save_to {
        options = options.with_save_to(path);
    }

    let table = batch.execute(Some(options))?;
    println!("{table}");
    if let Some(path) = save_to {
        println!("✅ Results saved to: {path}");
    }
    Ok(())
}
