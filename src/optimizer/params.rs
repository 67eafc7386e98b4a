use serde::{Deserialize, Serialize};

/// Physical battery parameters shared by every day's model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryParams {
    /// Nameplate energy capacity (MWh); upper bound on state of charge.
    pub max_charge: f64,
    /// Nameplate discharge power limit (MW, per hour).
    pub q_max_d: f64,
    /// Nameplate charge power limit (MW, per hour).
    pub q_max_r: f64,
    /// Round-trip efficiency applied to charge/discharge/regulation flows.
    pub lambda_c: f64,
    /// Regulation deployment rate linking offered capacity to the quantity
    /// actually dispatched.
    pub lambda_reg: f64,
}

impl Default for BatteryParams {
    fn default() -> Self {
        Self {
            max_charge: 200.0,
            q_max_d: 100.0,
            q_max_r: 100.0,
            lambda_c: 0.9,
            lambda_reg: 0.1,
        }
    }
}

/// Which market-settlement formulation a model instance builds. Both run
/// through the same code path; the tag only switches the points where the
/// formulations genuinely diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formulation {
    /// Regulation capacity is offered explicitly: capacity variables with a
    /// deployed = capacity x lambda_reg linkage, capacity revenue in the
    /// objective, reg-down deployment settled as a cost, and daily cycle
    /// caps at the nameplate energy capacity.
    CapacityAware,
    /// Deployed quantities only: no capacity variables, reg-down deployment
    /// settled as revenue, lambda_reg folded into the state-of-charge
    /// recursion, and daily cycle caps at the nameplate power limits.
    DeployedOnly,
}

impl Default for Formulation {
    fn default() -> Self {
        Formulation::CapacityAware
    }
}
