//! Executing bound writes.

use crate::binder::{BoundAction, Mode, StartupWriteList};
use crate::client::PvClient;
use crate::compat::{RemoteType, TypeFamily};
use crate::error::{ClientError, EngineError, Result};
use crate::value::{Number, TypedValue};
use tracing::{debug, info};

/// Perform the write bound to a key.
///
/// Set mode writes the configured value. Increment mode reads the current
/// value first and writes `current + delta`, so it must run exactly once per
/// key press.
pub fn execute<P: PvClient>(client: &P, action: &BoundAction<P::Channel>) -> Result<()> {
    let field = action.field();
    let payload = match action.mode {
        Mode::Set => set_payload(&action.remote_type, &action.value),
        Mode::Increment => {
            let Some(delta) = action.value.as_number() else {
                return Err(EngineError::Write {
                    pv: action.pv.clone(),
                    source: ClientError::Unsupported(format!(
                        "cannot increment by a {} value",
                        action.value.kind()
                    )),
                });
            };
            let current = client
                .get_numeric(&action.channel, field)
                .map_err(|source| EngineError::Write {
                    pv: action.pv.clone(),
                    source,
                })?;
            incremented(&action.pv, &action.remote_type, current, delta)?
        }
    };

    debug!(pv = %action.pv, %field, value = %payload, mode = %action.mode, "dispatch");
    client
        .put(&action.channel, field, &payload)
        .map_err(|source| EngineError::Write {
            pv: action.pv.clone(),
            source,
        })
}

/// Run the startup writes in order, stopping at the first failure.
pub fn execute_startup<P: PvClient>(client: &P, writes: &StartupWriteList<P::Channel>) -> Result<()> {
    for write in writes {
        let field = write.field();
        let payload = set_payload(&write.remote_type, &write.value);
        info!(pv = %write.pv, %field, value = %payload, "startup write");
        client
            .put(&write.channel, field, &payload)
            .map_err(|source| EngineError::Write {
                pv: write.pv.clone(),
                source,
            })?;
    }
    Ok(())
}

/// Value actually sent for a set. Integers bound to float PVs go out as floats.
fn set_payload(remote_type: &RemoteType, value: &TypedValue) -> TypedValue {
    match (remote_type.family(), value) {
        (TypeFamily::Float, TypedValue::Integer(i)) => TypedValue::Float(*i as f64),
        _ => value.clone(),
    }
}

fn incremented(pv: &str, remote_type: &RemoteType, current: Number, delta: Number) -> Result<TypedValue> {
    match (remote_type.family(), delta) {
        (TypeFamily::Float, _) | (_, Number::Float(_)) => {
            Ok(TypedValue::Float(current.as_f64() + delta.as_f64()))
        }
        (_, Number::Integer(delta)) => {
            let Some(current) = current.as_i64() else {
                return Err(EngineError::Write {
                    pv: pv.to_string(),
                    source: ClientError::Malformed(format!(
                        "expected an integer reading, got {}",
                        current
                    )),
                });
            };
            current
                .checked_add(delta)
                .map(TypedValue::Integer)
                .ok_or_else(|| EngineError::IncrementOverflow {
                    pv: pv.to_string(),
                    current,
                    delta,
                })
        }
    }
}
