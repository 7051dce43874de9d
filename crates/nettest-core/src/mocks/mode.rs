use serde::{Deserialize, Serialize};

/// How an active mock treats the sends it claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Claimed sends never reach the network
    #[default]
    Intercept,
    /// Claimed sends are recorded, then sent for real
    Observe,
    /// The mock never registers
    Disabled,
}
