//! The blocking key loop.

use crate::binder::KeybindingTable;
use crate::client::PvClient;
use crate::dispatch::execute;
use crate::keys::KeyCode;
use std::io;
use tracing::{info, trace, warn};

/// Source of key presses.
pub trait InputSource {
    /// Block until the next key. `None` means the input side asked to stop
    /// (e.g. Ctrl-C) or has closed.
    fn next_key(&mut self) -> io::Result<Option<KeyCode>>;
}

/// Counts reported when the loop ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub dispatched: usize,
    pub failed: usize,
}

/// Feed keys from `input` to the dispatcher until `quit` is pressed.
///
/// Failed writes are logged and do not stop the loop.
pub fn run_event_loop<P, I>(
    client: &P,
    table: &KeybindingTable<P::Channel>,
    quit: KeyCode,
    input: &mut I,
) -> io::Result<LoopSummary>
where
    P: PvClient,
    I: InputSource + ?Sized,
{
    let mut summary = LoopSummary::default();
    info!(bindings = table.len(), quit = %quit, "event loop started");

    while let Some(key) = input.next_key()? {
        if key == quit {
            break;
        }
        let Some(action) = table.get(&key) else {
            trace!(key = %key, "unbound key");
            continue;
        };

        summary.dispatched += 1;
        if let Err(err) = execute(client, action) {
            summary.failed += 1;
            warn!(key = %key, error = %err, "write failed");
        }
    }

    info!(
        dispatched = summary.dispatched,
        failed = summary.failed,
        "event loop stopped"
    );
    Ok(summary)
}
