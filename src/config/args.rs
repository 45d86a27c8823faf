//! CLI argument parsing using clap

use clap::{Parser, Subcommand};

/// svcwrap - run any executable as a Windows service
///
/// Interactive commands for inspecting wrapped services. The service itself
/// is started by the SCM as `svcwrap --service-wrapper <service-id>`.
#[derive(Parser, Debug)]
#[command(name = "svcwrap")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (can be repeated for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode - only show errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log output to file
    #[arg(long, global = true)]
    pub log: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the resolved configuration of a service
    Show {
        /// Service identifier (registry key name)
        service_id: String,
    },

    /// Print the latest log written for a service
    Logs {
        /// Service identifier (registry key name)
        service_id: String,

        /// Print only the path of the latest log file
        #[arg(long)]
        path: bool,
    },

    /// Run a service in the foreground; Ctrl+C stops it
    Run {
        /// Service identifier (registry key name)
        service_id: String,
    },

    /// Print a sample settings file
    SampleConfig,
}

impl Args {
    /// Get the log level based on verbose/quiet flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::INFO,
                1 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }
}
