//! Provider selection.

use std::fmt;
use std::str::FromStr;

/// Transport used to reach PVs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderKind {
    /// Channel Access, through `cainfo`/`caget`/`caput`.
    #[default]
    Ca,
    /// pvAccess, through `pvinfo`/`pvget`/`pvput`.
    Pva,
    /// In-memory PVs declared in the `[sim]` config section.
    Sim,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Ca => "ca",
            ProviderKind::Pva => "pva",
            ProviderKind::Sim => "sim",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ca" => Ok(ProviderKind::Ca),
            "pva" => Ok(ProviderKind::Pva),
            "sim" => Ok(ProviderKind::Sim),
            other => Err(format!(
                "unknown provider '{}' (expected ca, pva or sim)",
                other
            )),
        }
    }
}

/// Whether a pvData type id names a scalar (`double`, `enum_t`, ...) rather
/// than an array, structure or union.
pub(crate) fn is_scalar_type_id(type_id: &str) -> bool {
    !type_id.is_empty()
        && !type_id.ends_with("[]")
        && !matches!(type_id, "structure" | "union" | "any")
        && !type_id.contains('/')
}
