//! svcwrap - run any executable as a Windows service

use anyhow::Result;
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use svcwrap::config::{Args, Command, Settings};
use svcwrap::logs::{latest_log_path, open_wrapper_log, read_latest_log};
use svcwrap::mode::{Invocation, Mode};
use svcwrap::service::{run_console, run_wrapper};

fn main() -> Result<()> {
    let invocation = Invocation::from_env();

    match invocation.classify() {
        Mode::ServiceWrapper(service_id) => cmd_wrapper(&service_id),
        Mode::ElevationRelaunchNeeded => {
            eprintln!("svcwrap needs administrator rights. Re-run it from an elevated prompt.");
            std::process::exit(1);
        }
        Mode::NormalInteractive => {
            let args = Args::parse();
            init_logging(&args)?;
            if !invocation.elevated {
                warn!("Running without administrator rights, some operations may fail");
            }
            run_command(args)
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if let Some(log_file) = &args.log {
        let file = std::fs::File::create(log_file)?;
        subscriber.with_writer(file).with_ansi(false).init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Initialize logging for wrapper mode
///
/// The SCM gives services no console, so diagnostics go to
/// `<log_root>/wrapper/<service_id>.log`; stderr is kept for debug runs.
/// Without that file the subscriber discards everything.
fn init_wrapper_logging(settings: &Settings, service_id: &str) {
    use tracing_subscriber::{fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    match open_wrapper_log(&settings.log_root(), service_id) {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(file).with_ansi(false))
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
        Err(e) => {
            eprintln!("Warning: Failed to open wrapper log file: {}", e);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::sink))
                .init();
        }
    }
}

fn load_settings() -> Settings {
    Settings::load_default().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

/// Act as the service; the process exit code mirrors the final report
fn cmd_wrapper(service_id: &str) -> Result<()> {
    let settings = load_settings();
    init_wrapper_logging(&settings, service_id);

    match run_wrapper(service_id, &settings) {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            error!("Service wrapper for {} failed: {}", service_id, e);
            std::process::exit(e.exit_code() as i32);
        }
    }
}

fn run_command(args: Args) -> Result<()> {
    let settings = load_settings();

    match args.command {
        Command::Show { service_id } => cmd_show(&settings, &service_id),
        Command::Logs { service_id, path } => cmd_logs(&settings, &service_id, path),
        Command::Run { service_id } => {
            let code = run_console(&service_id, &settings)?;
            if code != 0 {
                std::process::exit(code as i32);
            }
            Ok(())
        }
        Command::SampleConfig => {
            print!("{}", Settings::sample());
            Ok(())
        }
    }
}

/// Show the resolved configuration of a service
fn cmd_show(settings: &Settings, service_id: &str) -> Result<()> {
    let config = settings.open_store().load(service_id)?;

    println!("Service: {}\n", service_id);
    println!("  Name:        {}", config.name);
    println!("  Executable:  {}", config.exe_path.display());
    println!("  Arguments:   {:?}", config.argv());
    println!("  Working dir: {}", config.working_dir().display());
    println!("  Log root:    {}", settings.log_root().display());

    Ok(())
}

/// Print the latest log of a service
fn cmd_logs(settings: &Settings, service_id: &str, path_only: bool) -> Result<()> {
    let root = settings.log_root();

    if path_only {
        println!("{}", latest_log_path(&root, service_id)?.display());
    } else {
        print!("{}", read_latest_log(&root, service_id)?);
    }

    Ok(())
}
