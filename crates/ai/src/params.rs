use serde::{Deserialize, Serialize};

use gwo_core::EngineResult;

use crate::burnout::BurnoutParams;
use crate::cluster::ClusterParams;
use crate::turnover::TurnoverParams;

/// `[models]` section: one table per model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    pub turnover: TurnoverParams,
    pub burnout: BurnoutParams,
    pub cluster: ClusterParams,
}

impl ModelParameters {
    pub fn validate(&self) -> EngineResult<()> {
        self.turnover.validate()?;
        self.burnout.validate()?;
        self.cluster.validate()
    }
}
