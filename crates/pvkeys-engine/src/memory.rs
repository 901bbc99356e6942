//! In-memory [`PvClient`] with declared PVs.
//!
//! Backs the `sim` provider and the engine tests. Every write is recorded,
//! and the number of open channels is tracked so tests can check that
//! nothing is left open after a failed bind.

use crate::client::{Field, PvClient};
use crate::compat::RemoteType;
use crate::error::ClientError;
use crate::value::{Number, TypedValue};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::debug;

#[derive(Clone, Debug)]
struct MemoryPv {
    /// `None` marks a PV whose value field is not a supported scalar.
    remote_type: Option<RemoteType>,
    value: TypedValue,
}

/// One recorded `put`.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteRecord {
    pub pv: String,
    pub field: Field,
    pub value: TypedValue,
}

#[derive(Debug, Default)]
pub struct MemoryClient {
    pvs: RefCell<HashMap<String, MemoryPv>>,
    writes: RefCell<Vec<WriteRecord>>,
    failing: RefCell<HashSet<String>>,
    open: Rc<Cell<usize>>,
}

/// Channel handed out by [`MemoryClient`].
#[derive(Debug)]
pub struct MemoryChannel {
    name: String,
    open: Rc<Cell<usize>>,
}

impl MemoryChannel {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.open.set(self.open.get().saturating_sub(1));
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`add_pv`](Self::add_pv).
    pub fn with_pv(self, name: &str, remote_type: &str, value: TypedValue) -> Self {
        self.add_pv(name, remote_type, value);
        self
    }

    pub fn add_pv(&self, name: &str, remote_type: &str, value: TypedValue) {
        self.pvs.borrow_mut().insert(
            name.to_string(),
            MemoryPv {
                remote_type: Some(RemoteType::new(remote_type)),
                value,
            },
        );
    }

    /// Declare a PV that connects but reports a non-scalar value field.
    pub fn add_unsupported_pv(&self, name: &str) {
        self.pvs.borrow_mut().insert(
            name.to_string(),
            MemoryPv {
                remote_type: None,
                value: TypedValue::Integer(0),
            },
        );
    }

    /// Make every later read and write of `name` fail.
    pub fn fail_io(&self, name: &str) {
        self.failing.borrow_mut().insert(name.to_string());
    }

    pub fn open_channels(&self) -> usize {
        self.open.get()
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.borrow().clone()
    }

    pub fn value(&self, name: &str) -> Option<TypedValue> {
        self.pvs.borrow().get(name).map(|pv| pv.value.clone())
    }

    fn check_io(&self, name: &str) -> Result<(), ClientError> {
        if self.failing.borrow().contains(name) {
            Err(ClientError::Failed(format!("simulated failure on '{}'", name)))
        } else {
            Ok(())
        }
    }
}

impl PvClient for MemoryClient {
    type Channel = MemoryChannel;

    fn connect(&self, name: &str) -> Result<MemoryChannel, ClientError> {
        if !self.pvs.borrow().contains_key(name) {
            return Err(ClientError::NotFound(name.to_string()));
        }
        self.open.set(self.open.get() + 1);
        Ok(MemoryChannel {
            name: name.to_string(),
            open: Rc::clone(&self.open),
        })
    }

    fn remote_type(&self, channel: &MemoryChannel) -> Result<RemoteType, ClientError> {
        let pvs = self.pvs.borrow();
        let pv = pvs
            .get(&channel.name)
            .ok_or_else(|| ClientError::NotFound(channel.name.clone()))?;
        pv.remote_type
            .clone()
            .ok_or_else(|| ClientError::Unsupported("value field is not a scalar".to_string()))
    }

    fn get_numeric(&self, channel: &MemoryChannel, field: Field) -> Result<Number, ClientError> {
        self.check_io(&channel.name)?;
        let pvs = self.pvs.borrow();
        let pv = pvs
            .get(&channel.name)
            .ok_or_else(|| ClientError::NotFound(channel.name.clone()))?;
        pv.value.as_number().ok_or_else(|| {
            ClientError::Malformed(format!("{} of '{}' is not numeric", field, channel.name))
        })
    }

    fn put(&self, channel: &MemoryChannel, field: Field, value: &TypedValue) -> Result<(), ClientError> {
        self.check_io(&channel.name)?;
        let mut pvs = self.pvs.borrow_mut();
        let pv = pvs
            .get_mut(&channel.name)
            .ok_or_else(|| ClientError::NotFound(channel.name.clone()))?;
        pv.value = value.clone();
        debug!(pv = %channel.name, %field, %value, "memory put");
        self.writes.borrow_mut().push(WriteRecord {
            pv: channel.name.clone(),
            field,
            value: value.clone(),
        });
        Ok(())
    }
}
