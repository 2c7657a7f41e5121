//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::info;

use super::console::{TerminalOperator, serve};
use super::demo;
use super::driver::{DriveOutcome, DriverConfig, drive};
use super::report::render_results;
use super::{CliError, CliResult, ExitCode};
use crate::link::{Console, Link, LinkConfig, ScriptedConsole};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::testing::{GroupId, Suite};

/// Options of `fieldtest run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub link: LinkConfig,
    pub scheduler: SchedulerConfig,
    pub driver: DriverConfig,
    /// Run against a scripted console that selects every group.
    pub offline: bool,
}

/// Run the demo suite, waiting for an operator console unless offline.
pub fn run_controller(options: RunOptions) -> CliResult<ExitCode> {
    let (suite, groups) =
        demo::build_suite().map_err(|e| CliError::failure(format!("Error: invalid demo suite: {e}")))?;

    if options.offline {
        info!("running offline against a scripted console");
        return run_suite(suite, &groups, ScriptedConsole::unattended(), &options);
    }

    let link = Link::bind(options.link.clone())
        .map_err(|e| CliError::failure(format!("Error: cannot listen on {}: {e}", options.link.bind_addr)))?;
    info!(addr = %link.local_addr(), "waiting for an operator console");
    run_suite(suite, &groups, link, &options)
}

fn run_suite<C: Console>(suite: Suite, groups: &[GroupId], console: C, options: &RunOptions) -> CliResult<ExitCode> {
    let mut scheduler = Scheduler::new(suite, console, options.scheduler.clone());
    scheduler.init();
    for &group in groups {
        scheduler
            .queue_group(group)
            .map_err(|e| CliError::failure(format!("Error: {e}")))?;
    }

    let outcome = drive(&mut scheduler, &options.driver).map_err(|e| CliError::failure(format!("Error: {e}")))?;
    if let DriveOutcome::TickLimit { ticks } = outcome {
        return Err(CliError::failure(format!(
            "Error: results not published after {ticks} ticks"
        )));
    }

    let results = scheduler.results();
    print!("{}", render_results(results, std::io::stdout().is_terminal()));
    if results.summary().failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Connect to a controller and act as its operator console until it disconnects.
pub fn run_console(addr: SocketAddr, select_all: bool, connect_timeout: Duration) -> CliResult<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::failure(format!("Error: cannot start runtime: {e}")))?;

    runtime.block_on(async {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| CliError::failure(format!("Error: no controller answered at {addr}")))?
            .map_err(|e| CliError::failure(format!("Error: cannot connect to {addr}: {e}")))?;
        info!(%addr, "connected to controller");

        let (read, write) = stream.into_split();
        // Prompts read stdin synchronously; the connection waits on the operator anyway.
        let mut operator = TerminalOperator::stdio(select_all, std::io::stdout().is_terminal());
        let received = serve(BufReader::new(read), write, &mut operator)
            .await
            .map_err(|e| CliError::failure(format!("Error: {e}")))?;
        info!(results = received, "controller closed the connection");
        Ok(ExitCode::SUCCESS)
    })
}
