//! Modal Stack Example
//!
//! Three components compete for the back button:
//!
//! - a confirmation modal (priority 200), closes itself
//! - a side drawer (priority 100), collapses itself
//! - the screen stack (priority 0), pops until it reaches the root
//!
//! A scripted "user" presses back until the shell exits from the root
//! screen, which no handler consumes.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package modal-stack -- --screens 3 --config demos/modal-stack/backstack.toml
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backstack::ShellBuilder;
use clap::Parser;
use parking_lot::Mutex;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Back navigation through a modal, a drawer and a screen stack")]
struct Args {
    /// Screens pushed on top of the root screen.
    #[arg(long, default_value_t = 3)]
    screens: usize,

    /// Delay between scripted back presses.
    #[arg(long, default_value_t = 200)]
    interval_ms: u64,

    /// Configuration file (defaults to searching the current directory).
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

/// What is currently on screen.
#[derive(Debug)]
struct UiState {
    modal_open: bool,
    drawer_open: bool,
    screens: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = ShellBuilder::new();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let mut shell = builder.build()?;

    let ui = Arc::new(Mutex::new(UiState {
        modal_open: true,
        drawer_open: true,
        screens: (0..=args.screens).map(|i| format!("screen-{i}")).collect(),
    }));

    let registry = shell.registry();

    // Modal: consumes one press, then unregisters itself through its guard.
    let modal_guard = Arc::new(Mutex::new(None));
    {
        let ui = Arc::clone(&ui);
        let modal_guard_handle = Arc::clone(&modal_guard);
        let guard = registry.register(
            move || {
                let mut ui = ui.lock();
                if !ui.modal_open {
                    return false;
                }
                ui.modal_open = false;
                info!("Closing confirmation modal");
                drop(modal_guard_handle.lock().take());
                true
            },
            200,
        );
        *modal_guard.lock() = Some(guard);
    }

    // Drawer: stays registered, declines once collapsed.
    let _drawer = {
        let ui = Arc::clone(&ui);
        registry.register(
            move || {
                let mut ui = ui.lock();
                if ui.drawer_open {
                    ui.drawer_open = false;
                    info!("Collapsing side drawer");
                    true
                } else {
                    false
                }
            },
            100,
        )
    };

    // Screen stack: pops until only the root is left.
    let _stack = {
        let ui = Arc::clone(&ui);
        registry.register(
            move || {
                let mut ui = ui.lock();
                if ui.screens.len() > 1 {
                    let popped = ui.screens.pop();
                    info!(screen = ?popped, remaining = ui.screens.len(), "Popped screen");
                    true
                } else {
                    false
                }
            },
            0,
        )
    };

    let back = shell
        .sender()
        .ok_or_else(|| anyhow::anyhow!("back channel closed before start"))?;
    let interval = Duration::from_millis(args.interval_ms);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if let Err(e) = back.press().await {
                warn!(error = %e, "Stopping scripted back presses");
                break;
            }
        }
    });

    let exit = shell.run().await?;
    info!(?exit, state = ?*ui.lock(), "Demo finished");

    Ok(())
}
