//! CLI module for fieldtest
//!
//! ## Commands
//!
//! - `run` - Drive the bundled demo suite, waiting for an operator console
//! - `console` - Act as the operator console of a running controller
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `console` - Operator side of the line protocol
//! - `demo` - The bundled demo suite
//! - `driver` - Fixed-period tick loop
//! - `report` - Results rendering
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod console;
pub mod demo;
pub mod driver;
pub mod report;

use std::fmt;
use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::link::LinkConfig;
use crate::link::protocol::DEFAULT_PORT;
use crate::scheduler::SchedulerConfig;
use crate::scheduler::config::DEFAULT_WARMUP_TICKS;
use crate::version::FIELDTEST_VERSION;
use driver::DriverConfig;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const DEFAULT_BIND: &str = "0.0.0.0:5809";
const DEFAULT_CONNECT: &str = "127.0.0.1:5809";

// ============================================================================
// Clap CLI definition
// ============================================================================

/// On-device integration tests with a remote operator console
#[derive(Parser, Debug)]
#[command(name = "fieldtest")]
#[command(version = FIELDTEST_VERSION)]
#[command(about = "On-device integration tests with a remote operator console", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive the bundled demo suite and publish results to the console
    Run {
        /// Address to listen on for the operator console
        #[arg(long, value_name = "ADDR", default_value = DEFAULT_BIND)]
        bind: SocketAddr,
        /// Milliseconds between scheduler ticks
        #[arg(long = "period-ms", value_name = "MS", default_value_t = 20)]
        period_ms: u64,
        /// Idle ticks before the group selection is requested
        #[arg(long = "warmup-ticks", value_name = "N", default_value_t = DEFAULT_WARMUP_TICKS)]
        warmup_ticks: u32,
        /// Give up on a question or results exchange after this long
        #[arg(long = "exchange-timeout-ms", value_name = "MS")]
        exchange_timeout_ms: Option<u64>,
        /// Give up on the group selection after this long
        #[arg(long = "selection-timeout-ms", value_name = "MS")]
        selection_timeout_ms: Option<u64>,
        /// Stop after this many ticks
        #[arg(long = "max-ticks", value_name = "N")]
        max_ticks: Option<u64>,
        /// Run without a console: every group selected, every question answered no
        #[arg(long, conflicts_with_all = ["bind", "exchange_timeout_ms", "selection_timeout_ms"])]
        offline: bool,
    },

    /// Connect to a controller as its operator console
    Console {
        /// Controller address
        #[arg(long, value_name = "ADDR", default_value = DEFAULT_CONNECT)]
        connect: SocketAddr,
        /// Select every offered group without prompting
        #[arg(long = "select-all")]
        select_all: bool,
        /// Seconds to wait for the controller to accept
        #[arg(long = "connect-timeout", value_name = "SECS", default_value_t = 10)]
        connect_timeout: u64,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Run {
            bind,
            period_ms,
            warmup_ticks,
            exchange_timeout_ms,
            selection_timeout_ms,
            max_ticks,
            offline,
        } => {
            let mut link = LinkConfig::default().with_bind_addr(bind);
            if let Some(ms) = exchange_timeout_ms {
                link = link.with_exchange_timeout(Duration::from_millis(ms));
            }
            if let Some(ms) = selection_timeout_ms {
                link = link.with_selection_timeout(Duration::from_millis(ms));
            }
            let mut driver = DriverConfig::default().with_period(Duration::from_millis(period_ms));
            if let Some(ticks) = max_ticks {
                driver = driver.with_max_ticks(ticks);
            }
            commands::run_controller(commands::RunOptions {
                link,
                scheduler: SchedulerConfig::default().with_warmup_ticks(warmup_ticks),
                driver,
                offline,
            })
        }
        Command::Console {
            connect,
            select_all,
            connect_timeout,
        } => commands::run_console(connect, select_all, Duration::from_secs(connect_timeout)),
    }
}

// ============================================================================
// Tests
// ============================================================================
