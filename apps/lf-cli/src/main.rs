use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use lf_app::{
    AppError, AppResult, RunOptions, RunProgress, compile, project_service, run_service,
};
use lf_core::{Clock, MonotonicClock};
use lf_sim::IntegratorType;

#[derive(Parser)]
#[command(name = "lf-cli")]
#[command(about = "LevelFlow CLI - Adaptive fuzzy tank level control", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter project file
    Init {
        /// Path of the project file to create (.yaml, .yml or .json)
        project_path: PathBuf,
        /// Project name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project file
        project_path: PathBuf,
    },
    /// Print the active membership and rules
    Generate {
        /// Path to the project file
        project_path: PathBuf,
        /// Pin the configuration into the project file
        #[arg(long)]
        write: bool,
    },
    /// Run a closed-loop simulation against the project's tank
    Simulate {
        /// Path to the project file
        project_path: PathBuf,
        /// Simulated duration in seconds
        #[arg(long, default_value_t = 300.0)]
        duration: f64,
        /// Clock step in seconds
        #[arg(long, default_value_t = 0.05)]
        step: f64,
        /// Keep every n-th control tick
        #[arg(long, default_value_t = 1)]
        record_every: usize,
        #[arg(long, value_enum, default_value_t = IntegratorArg::Rk4)]
        integrator: IntegratorArg,
        /// Output file for the recorded ticks (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
        /// Store the learned gain multipliers back into the project file
        #[arg(long)]
        save_gains: bool,
    },
    /// Convert a legacy controller settings file into a project
    ImportLegacy {
        /// Legacy JSON settings file
        settings_path: PathBuf,
        /// Path of the project file to write
        project_path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum IntegratorArg {
    Rk4,
    Euler,
}

impl From<IntegratorArg> for IntegratorType {
    fn from(arg: IntegratorArg) -> Self {
        match arg {
            IntegratorArg::Rk4 => IntegratorType::RK4,
            IntegratorArg::Euler => IntegratorType::ForwardEuler,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            project_path,
            name,
            force,
        } => cmd_init(&project_path, name, force),
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Generate {
            project_path,
            write,
        } => cmd_generate(&project_path, write),
        Commands::Simulate {
            project_path,
            duration,
            step,
            record_every,
            integrator,
            output,
            format,
            save_gains,
        } => {
            let options = RunOptions {
                duration_s: duration,
                step_s: step,
                record_every,
                integrator: integrator.into(),
            };
            cmd_simulate(&project_path, &options, output.as_deref(), format, save_gains)
        }
        Commands::ImportLegacy {
            settings_path,
            project_path,
        } => cmd_import_legacy(&settings_path, &project_path),
    }
}

fn cmd_init(project_path: &Path, name: Option<String>, force: bool) -> AppResult<()> {
    if project_path.exists() && !force {
        return Err(AppError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            project_path.display()
        )));
    }
    let name = name.unwrap_or_else(|| {
        project_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("tank")
            .to_string()
    });
    let project = project_service::default_project(name);
    project_service::save_project(project_path, &project)?;
    println!("✓ Created project: {}", project_path.display());
    Ok(())
}

fn cmd_validate(project_path: &Path) -> AppResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = project_service::load_project(project_path)?;
    project_service::validate_project(&project)?;
    // Compiling catches what the schema check cannot, e.g. rule keys.
    compile::build_controller(&project)?;
    let summary = project_service::summarize(&project);
    println!("✓ Project is valid");
    println!("  Name: {}", summary.name);
    println!("  Valves: {}", summary.valves.join(", "));
    println!(
        "  Membership: {}",
        if summary.explicit_fuzzy {
            "explicit"
        } else {
            "generated from tuning"
        }
    );
    println!("  Adapted gains: {}", if summary.adapted { "yes" } else { "no" });
    println!("  Simulated plant: {}", if summary.has_plant { "yes" } else { "default" });
    Ok(())
}

fn cmd_generate(project_path: &Path, write: bool) -> AppResult<()> {
    let mut project = project_service::load_project(project_path)?;
    let config = compile::fuzzy_config(&project)?;
    let def = compile::fuzzy_def(&config);

    let yaml = serde_yaml::to_string(&def)
        .map_err(|e| AppError::Project(format!("Failed to serialize configuration: {}", e)))?;
    print!("{}", yaml);

    if write {
        project.fuzzy = Some(def);
        project_service::save_project(project_path, &project)?;
        println!("✓ Configuration pinned in {}", project_path.display());
    }
    Ok(())
}

fn cmd_simulate(
    project_path: &Path,
    options: &RunOptions,
    output: Option<&Path>,
    format: OutputFormat,
    save_gains: bool,
) -> AppResult<()> {
    let mut project = project_service::load_project(project_path)?;

    let wall = MonotonicClock::start();
    let mut last_second = -1.0;
    let response = run_service::simulate_with_progress(
        &project,
        options,
        Some(&mut |p: RunProgress| {
            // Redraw every ten simulated seconds.
            if p.sim_time_s - last_second >= 10.0 || p.fraction_complete >= 1.0 {
                render_progress(&p);
                last_second = p.sim_time_s;
            }
        }),
    )?;
    clear_progress_line();

    println!(
        "✓ Simulation completed: {} control ticks ({} skipped) in {:.2} s",
        response.control_ticks,
        response.skipped_ticks,
        wall.now_s()
    );
    println!("  Final state: {}", response.final_state);
    println!("  Final level: {:.4} m", response.final_level);
    for (valve, gain) in &response.gains {
        println!("  Gain {}: {:.4}", valve, gain);
    }

    let rendered = match format {
        OutputFormat::Csv => run_service::records_to_csv(&response),
        OutputFormat::Json => run_service::records_to_json(&response)?,
    };
    if let Some(path) = output {
        std::fs::write(path, rendered).map_err(|e| AppError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        println!(
            "✓ Exported {} records to {}",
            response.records.len(),
            path.display()
        );
    } else {
        print!("{}", rendered);
    }

    if save_gains {
        project_service::store_gains(&mut project, &response.gains);
        project_service::save_project(project_path, &project)?;
        tracing::info!(gains = ?project.gain_multipliers, "gains stored");
        println!("✓ Gains saved to {}", project_path.display());
    }
    Ok(())
}

fn cmd_import_legacy(settings_path: &Path, project_path: &Path) -> AppResult<()> {
    println!("Importing legacy settings: {}", settings_path.display());
    let project = project_service::import_legacy(settings_path)?;
    project_service::save_project(project_path, &project)?;
    println!("✓ Wrote project: {}", project_path.display());
    Ok(())
}

fn render_progress(progress: &RunProgress) {
    let pct = (progress.fraction_complete * 100.0).clamp(0.0, 100.0);
    eprint!(
        "\r  t = {:>8.1} / {:.1} s  [{:>5.1}%]  level {:.3} m  {:<26}",
        progress.sim_time_s, progress.t_end_s, pct, progress.level, progress.state
    );
    let _ = io::stderr().flush();
}

fn clear_progress_line() {
    eprint!("\r{:80}\r", "");
    let _ = io::stderr().flush();
}
