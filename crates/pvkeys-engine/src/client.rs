//! Remote-variable client abstraction.

use crate::compat::RemoteType;
use crate::error::ClientError;
use crate::value::{Number, TypedValue};
use std::fmt;

/// Part of a PV a read or write targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// The `value` field itself.
    Value,
    /// `value.index`, the selected choice of an enumerated PV.
    ValueIndex,
}

impl Field {
    pub fn path(self) -> &'static str {
        match self {
            Field::Value => "value",
            Field::ValueIndex => "value.index",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Connection to a control system.
///
/// Channels are released when dropped.
pub trait PvClient {
    type Channel;

    /// Open a channel to the PV with the given full name.
    fn connect(&self, name: &str) -> Result<Self::Channel, ClientError>;

    /// Type of the channel's `value` field. Fails with
    /// [`ClientError::Unsupported`] when the field is not a scalar.
    fn remote_type(&self, channel: &Self::Channel) -> Result<RemoteType, ClientError>;

    /// Read the current number stored in `field`.
    fn get_numeric(&self, channel: &Self::Channel, field: Field) -> Result<Number, ClientError>;

    /// Write `value` to `field`.
    fn put(&self, channel: &Self::Channel, field: Field, value: &TypedValue)
    -> Result<(), ClientError>;
}
