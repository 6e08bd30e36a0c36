//! Event listener command
//!
//! Runs as a supervisor `[eventlistener:x]` child. stdout belongs to the
//! supervisor protocol, so nothing in here may print.

use eyre::{Context, Result};
use std::io;

use crate::channel::SupervisorChannel;
use crate::cli::ListenArgs;
use crate::config::Config;
use crate::notifier::NotifierLoop;
use crate::session::Session;
use crate::shutdown;
use crate::transport::UdpTransport;

pub fn run(args: ListenArgs, config: &Config) -> Result<()> {
    let mut config = config.clone();
    apply_overrides(&args, &mut config);

    let session = Session::from_config(&config).context("Failed to initialize notifier session")?;
    let transport =
        UdpTransport::new(session.collector, session.append_newline).context("Failed to open UDP transport")?;

    shutdown::spawn_signal_watcher()?;

    let channel = SupervisorChannel::new(io::stdin().lock(), io::stdout().lock());
    let stats = NotifierLoop::new(&session, channel, transport).run();
    log::debug!("Listener finished: {:?}", stats);

    log::logger().flush();
    Ok(())
}

/// Layer command line flags over the loaded configuration
fn apply_overrides(args: &ListenArgs, config: &mut Config) {
    if !args.events.is_empty() {
        config.filter.events = args.events.clone();
    }
    if args.capture_output {
        config.capture_output = true;
    }
    if !args.include.is_empty() {
        config.include = args.include.clone();
    }
    if args.append_newline {
        config.record.append_newline = true;
    }
}
