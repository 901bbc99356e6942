//! Startup and the interactive session.

use crate::terminal::TerminalInput;
use anyhow::{Context, Result};
use pvkeys_core::Config;
use pvkeys_engine::{Binder, Bindings, PvClient, execute_startup, run_event_loop};
use std::fmt::Write as _;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Run startup writes, then read keys until quit.
    Interactive,
    /// Bind and print the bindings without writing anything.
    Check,
}

/// Bind `config` against `client` and run it.
pub fn run<P: PvClient>(client: &P, config: &Config, mode: RunMode) -> Result<()> {
    let bindings = Binder::new(client, &config.prefix)
        .with_quit_key(config.quit)
        .bind(config.keybindings.as_ref(), config.put.as_ref())
        .context("Startup failed")?;
    info!(
        provider = %config.provider,
        keys = bindings.keys.len(),
        startup_writes = bindings.startup.len(),
        "bindings resolved"
    );

    if mode == RunMode::Check {
        print!("{}", summary(&bindings, config));
        return Ok(());
    }

    execute_startup(client, &bindings.startup).context("Startup write failed")?;

    println!(
        "pvkeys: {} key(s) bound, press '{}' to quit",
        bindings.keys.len(),
        config.quit
    );
    let result = {
        let mut input = TerminalInput::new().context("Failed to enable raw terminal mode")?;
        run_event_loop(client, &bindings.keys, config.quit, &mut input)
    };
    let stats = result.context("Reading keyboard input failed")?;
    if stats.failed > 0 {
        println!(
            "pvkeys: {} write(s) sent, {} failed",
            stats.dispatched - stats.failed,
            stats.failed
        );
    }
    Ok(())
}

/// Human-readable listing of startup writes and key bindings.
pub fn summary<C>(bindings: &Bindings<C>, config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "provider: {}", config.provider);
    let _ = writeln!(out, "quit: {}", config.quit);
    for write in &bindings.startup {
        let _ = writeln!(out, "put  {} = {}", write.pv, write.value);
    }
    let mut keys: Vec<_> = bindings.keys.iter().collect();
    keys.sort_by_key(|(key, _)| **key);
    for (key, action) in keys {
        let _ = writeln!(out, "{:<6} {} ({})", key.to_string(), action, action.remote_type);
    }
    out
}
