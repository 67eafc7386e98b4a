//! Day-Optimization Model
//!
//! Builds one linear program per (month, day): 24 hourly decision-variable
//! sets, a revenue-maximizing objective over energy arbitrage and
//! frequency-regulation settlement, and the full physical constraint set
//! (state-of-charge dynamics, power limits, missing-hour zeroing, daily
//! cycle caps). The day's starting state of charge is an anchored soc[0]
//! variable so that an out-of-range boundary is reported as infeasible
//! rather than silently clamped.
//!
//! A model instance moves through build -> set_objective -> add_constraints
//! -> solve and is then discarded; each instance is solved exactly once.

use std::time::{Duration, Instant};

use good_lp::{
    constraint, default_solver, variable, Constraint, Expression, ProblemVariables,
    ResolutionError, Solution, SolverModel, Variable,
};
use tracing::debug;

use crate::domain::{DayInputs, DaySchedule, HourlyDispatch, HOURS};
use crate::error::DispatchError;

use super::params::{BatteryParams, Formulation};

/// One day's LP instance.
pub struct DayModel {
    params: BatteryParams,
    formulation: Formulation,
    month: u32,
    day: u32,
    vars: ProblemVariables,
    charge: Vec<Variable>,
    discharge: Vec<Variable>,
    reg_up: Vec<Variable>,
    reg_down: Vec<Variable>,
    reg_up_capacity: Option<Vec<Variable>>,
    reg_down_capacity: Option<Vec<Variable>>,
    /// soc[0] is the day-start boundary state; soc[1..=24] the end-of-hour
    /// states.
    soc: Vec<Variable>,
    objective: Option<Expression>,
    constraints: Vec<Constraint>,
}

/// Extracted result of a successful solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedDay {
    pub month: u32,
    pub day: u32,
    pub schedule: DaySchedule,
    pub objective_value: f64,
}

impl DayModel {
    /// Declare the day's decision variables. Flow variables are bounded
    /// below at zero; their upper bounds come from the power and cycle
    /// constraints, not from the variables themselves. State of charge is
    /// bounded to [0, max_charge].
    pub fn build(params: &BatteryParams, formulation: Formulation, month: u32, day: u32) -> Self {
        let mut vars = ProblemVariables::new();
        let charge = vars.add_vector(variable().min(0.0), HOURS);
        let discharge = vars.add_vector(variable().min(0.0), HOURS);
        let reg_up = vars.add_vector(variable().min(0.0), HOURS);
        let reg_down = vars.add_vector(variable().min(0.0), HOURS);
        let soc = vars.add_vector(variable().min(0.0).max(params.max_charge), HOURS + 1);
        let (reg_up_capacity, reg_down_capacity) = match formulation {
            Formulation::CapacityAware => (
                Some(vars.add_vector(variable().min(0.0), HOURS)),
                Some(vars.add_vector(variable().min(0.0), HOURS)),
            ),
            Formulation::DeployedOnly => (None, None),
        };

        Self {
            params: params.clone(),
            formulation,
            month,
            day,
            vars,
            charge,
            discharge,
            reg_up,
            reg_down,
            reg_up_capacity,
            reg_down_capacity,
            soc,
            objective: None,
            constraints: Vec::new(),
        }
    }

    /// Revenue-maximizing objective: discharge earns and charge pays the
    /// energy price; regulation-up deployment earns its price. Under the
    /// capacity-aware formulation reg-down deployment settles as a cost and
    /// both capacity offers earn their price; under the deployed-only
    /// formulation reg-down deployment settles as revenue.
    pub fn set_objective(&mut self, inputs: &DayInputs) {
        let energy: Expression = (0..HOURS)
            .map(|h| inputs.energy[h] * (self.discharge[h] - self.charge[h]))
            .sum();
        let reg_up_deployed: Expression = (0..HOURS)
            .map(|h| inputs.reg_up[h] * self.reg_up[h])
            .sum();
        let reg_down_deployed: Expression = (0..HOURS)
            .map(|h| inputs.reg_down[h] * self.reg_down[h])
            .sum();

        let objective = match (&self.reg_up_capacity, &self.reg_down_capacity) {
            (Some(up_cap), Some(down_cap)) => {
                let capacity: Expression = (0..HOURS)
                    .map(|h| inputs.reg_up[h] * up_cap[h] + inputs.reg_down[h] * down_cap[h])
                    .sum();
                energy + reg_up_deployed - reg_down_deployed + capacity
            }
            _ => energy + reg_up_deployed + reg_down_deployed,
        };
        self.objective = Some(objective);
    }

    /// Add the day's constraint set, anchored to `boundary_soc` (the
    /// run-level initial state on calendar day 1, the previous day's ending
    /// state otherwise).
    pub fn add_constraints(&mut self, boundary_soc: f64, inputs: &DayInputs) {
        let p = &self.params;
        let soc = &self.soc;
        let charge = &self.charge;
        let discharge = &self.discharge;
        let reg_up = &self.reg_up;
        let reg_down = &self.reg_down;
        let mut cons = Vec::new();

        // Day-start anchor. Infeasible if the boundary lies outside the
        // battery's energy capacity.
        cons.push(constraint!(soc[0] == boundary_soc));

        // The deployed-only formulation has no capacity variables, so the
        // deployment rate is folded directly into the recursion.
        let reg_rate = match self.formulation {
            Formulation::CapacityAware => p.lambda_c,
            Formulation::DeployedOnly => p.lambda_c * p.lambda_reg,
        };

        for h in 0..HOURS {
            let delta = p.lambda_c * (charge[h] - discharge[h])
                + reg_rate * (reg_down[h] - reg_up[h]);
            cons.push(constraint!(soc[h + 1] == soc[h] + delta));

            // Nameplate power limits, shared between energy and regulation.
            cons.push(constraint!(charge[h] + reg_down[h] <= p.q_max_r));
            cons.push(constraint!(discharge[h] + reg_up[h] <= p.q_max_d));
        }

        // Deployed regulation follows offered capacity at the deployment
        // rate.
        if let (Some(up_cap), Some(down_cap)) = (&self.reg_up_capacity, &self.reg_down_capacity) {
            for h in 0..HOURS {
                cons.push(constraint!(reg_up[h] == p.lambda_reg * up_cap[h]));
                cons.push(constraint!(reg_down[h] == p.lambda_reg * down_cap[h]));
            }
        }

        // Hours with no source data are not bid.
        for h in 0..HOURS {
            if inputs.missing_energy[h] {
                cons.push(constraint!(charge[h] + discharge[h] == 0.0));
            }
            if inputs.missing_reg_up[h] {
                cons.push(constraint!(reg_up[h] == 0.0));
            }
            if inputs.missing_reg_down[h] {
                cons.push(constraint!(reg_down[h] == 0.0));
            }
        }

        // Daily throughput capped at one full nameplate cycle per side.
        let (charge_cap, discharge_cap) = match self.formulation {
            Formulation::CapacityAware => (p.max_charge, p.max_charge),
            Formulation::DeployedOnly => (p.q_max_r, p.q_max_d),
        };
        let charge_side: Expression = (0..HOURS).map(|h| charge[h] + reg_down[h]).sum();
        let discharge_side: Expression = (0..HOURS).map(|h| discharge[h] + reg_up[h]).sum();
        cons.push(constraint!(charge_side <= charge_cap));
        cons.push(constraint!(discharge_side <= discharge_cap));

        // The day must not consume the energy stock it started with: the
        // schedule funds its own discharge within the day.
        cons.push(constraint!(soc[HOURS] >= soc[0]));

        self.constraints = cons;
    }

    /// Solve the LP within the given wall-clock budget and extract the
    /// day's schedule. Infeasibility and solver failures are fatal for the
    /// run; neither is retryable for the same day.
    pub fn solve(self, time_budget: Duration) -> Result<SolvedDay, DispatchError> {
        let (month, day) = (self.month, self.day);
        let objective = self.objective.ok_or_else(|| DispatchError::Solver {
            month,
            day,
            detail: "model solved before an objective was set".to_string(),
        })?;

        debug!(
            month,
            day,
            constraints = self.constraints.len(),
            "solving day model"
        );

        let mut model = self.vars.maximise(objective.clone()).using(default_solver);
        for c in self.constraints {
            model = model.with(c);
        }

        let started = Instant::now();
        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => DispatchError::Infeasible { month, day },
            other => DispatchError::Solver {
                month,
                day,
                detail: other.to_string(),
            },
        })?;
        let elapsed = started.elapsed();
        if elapsed > time_budget {
            return Err(DispatchError::Solver {
                month,
                day,
                detail: format!(
                    "solve took {elapsed:?}, exceeding the {time_budget:?} per-day budget"
                ),
            });
        }

        let hours = (0..HOURS)
            .map(|h| HourlyDispatch {
                hour: (h + 1) as u32,
                charge: solution.value(self.charge[h]),
                discharge: solution.value(self.discharge[h]),
                reg_up_deployed: solution.value(self.reg_up[h]),
                reg_down_deployed: solution.value(self.reg_down[h]),
                reg_up_capacity: self.reg_up_capacity.as_ref().map(|v| solution.value(v[h])),
                reg_down_capacity: self.reg_down_capacity.as_ref().map(|v| solution.value(v[h])),
                soc: solution.value(self.soc[h + 1]),
            })
            .collect();

        Ok(SolvedDay {
            month,
            day,
            schedule: DaySchedule {
                soc_start: solution.value(self.soc[0]),
                hours,
            },
            objective_value: solution.eval(&objective),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    const TOL: f64 = 1e-6;

    fn params() -> BatteryParams {
        BatteryParams::default()
    }

    /// A day where the energy market is priced every hour and both
    /// regulation markets have no source data (the only way a regulation
    /// price reaches the model as zero).
    fn energy_only_day(prices: [f64; HOURS]) -> DayInputs {
        let mut inputs = DayInputs::empty(1, 1);
        inputs.energy = prices;
        inputs.missing_energy = [false; HOURS];
        inputs
    }

    fn solve_day(
        inputs: &DayInputs,
        formulation: Formulation,
        boundary: f64,
    ) -> Result<SolvedDay, DispatchError> {
        let mut model = DayModel::build(&params(), formulation, inputs.month, inputs.day);
        model.set_objective(inputs);
        model.add_constraints(boundary, inputs);
        model.solve(Duration::from_secs(30))
    }

    #[test]
    fn flat_prices_yield_no_arbitrage_profit() {
        let inputs = energy_only_day([10.0; HOURS]);
        let solved = solve_day(&inputs, Formulation::CapacityAware, 100.0).unwrap();
        assert!(
            solved.objective_value.abs() < TOL,
            "flat prices should leave nothing to arbitrage, got {}",
            solved.objective_value
        );
        for h in &solved.schedule.hours {
            assert!(h.soc >= -TOL && h.soc <= params().max_charge + TOL);
        }
    }

    #[test]
    fn price_spread_is_arbitraged_charge_low_discharge_high() {
        let mut prices = [0.0; HOURS];
        prices[0] = 5.0;
        prices[1] = 15.0;
        let mut inputs = energy_only_day(prices);
        // Hours priced at zero are zero because they were filled: only the
        // first two hours carry real market data.
        for h in 2..HOURS {
            inputs.missing_energy[h] = true;
        }

        let solved = solve_day(&inputs, Formulation::CapacityAware, 100.0).unwrap();
        let p = params();
        let hours = &solved.schedule.hours;

        // Buy 100 MWh at 5, sell 100 MWh at 15: objective 1000.
        assert!((solved.objective_value - 1000.0).abs() < 1e-4);
        assert!((hours[0].charge - p.q_max_r).abs() < 1e-4);
        assert!((hours[1].discharge - p.q_max_d).abs() < 1e-4);
        // soc moves by lambda_c times the flow.
        assert!((hours[0].soc - (100.0 + p.lambda_c * hours[0].charge)).abs() < 1e-4);
        assert!((hours[1].soc - (hours[0].soc - p.lambda_c * hours[1].discharge)).abs() < 1e-4);
    }

    #[test]
    fn boundary_above_capacity_is_infeasible() {
        let inputs = energy_only_day([10.0; HOURS]);
        let err = solve_day(&inputs, Formulation::CapacityAware, 250.0).unwrap_err();
        assert_eq!(err, DispatchError::Infeasible { month: 1, day: 1 });
    }

    #[test]
    fn missing_energy_hours_are_not_bid() {
        let mut prices = [0.0; HOURS];
        prices[3] = 50.0; // attractive, but the hour has no source data
        prices[4] = 1.0;
        prices[5] = 40.0;
        let mut inputs = energy_only_day(prices);
        inputs.missing_energy[3] = true;

        let solved = solve_day(&inputs, Formulation::CapacityAware, 100.0).unwrap();
        let h3 = &solved.schedule.hours[3];
        assert!(h3.charge.abs() < TOL && h3.discharge.abs() < TOL);
        // The spread between the priced hours is still taken.
        assert!(solved.objective_value > 0.0);
    }

    #[test]
    fn deployed_regulation_follows_offered_capacity() {
        let mut inputs = energy_only_day([10.0; HOURS]);
        inputs.reg_up[0] = 2.0;
        inputs.missing_reg_up[0] = false;

        let solved = solve_day(&inputs, Formulation::CapacityAware, 100.0).unwrap();
        let p = params();
        let h1 = &solved.schedule.hours[0];

        // Capacity revenue dominates: deployment runs to the power limit.
        assert!(h1.reg_up_deployed > TOL);
        let capacity = h1.reg_up_capacity.expect("capacity-aware run");
        assert!((h1.reg_up_deployed - p.lambda_reg * capacity).abs() < 1e-4);
        assert!(h1.discharge + h1.reg_up_deployed <= p.q_max_d + TOL);
    }

    #[test]
    fn deployed_only_settles_reg_down_as_revenue() {
        let mut inputs = energy_only_day([10.0; HOURS]);
        inputs.reg_down[0] = 1.0;
        inputs.missing_reg_down[0] = false;

        let solved = solve_day(&inputs, Formulation::DeployedOnly, 100.0).unwrap();
        let p = params();
        let h1 = &solved.schedule.hours[0];
        assert!(h1.reg_down_deployed > TOL);
        assert!(h1.reg_up_capacity.is_none() && h1.reg_down_capacity.is_none());
        // Deployed-only cycle caps bind at the nameplate power limits.
        assert!(solved.schedule.charge_side_total() <= p.q_max_r + TOL);
        assert!(solved.schedule.discharge_side_total() <= p.q_max_d + TOL);
    }

    #[test]
    fn full_cycle_is_reachable_when_spreads_repeat() {
        // Cheap/dear pairs twice over: the optimum charges 100 + 100 and
        // discharges 100 + 100, exhausting both daily budgets exactly.
        let mut prices = [0.0; HOURS];
        prices[0] = 1.0;
        prices[1] = 20.0;
        prices[2] = 1.0;
        prices[3] = 20.0;
        let mut inputs = energy_only_day(prices);
        for h in 4..HOURS {
            inputs.missing_energy[h] = true;
        }

        let solved = solve_day(&inputs, Formulation::CapacityAware, 100.0).unwrap();
        let p = params();
        assert!((solved.schedule.charge_side_total() - p.max_charge).abs() < 1e-4);
        assert!((solved.schedule.discharge_side_total() - p.max_charge).abs() < 1e-4);
        assert!((solved.objective_value - (20.0 * 200.0 - 1.0 * 200.0)).abs() < 1e-3);
    }

    #[test]
    fn solve_without_objective_is_reported_not_panicked() {
        let inputs = energy_only_day([10.0; HOURS]);
        let mut model = DayModel::build(&params(), Formulation::CapacityAware, 1, 1);
        model.add_constraints(100.0, &inputs);
        let err = model.solve(Duration::from_secs(30)).unwrap_err();
        assert!(matches!(err, DispatchError::Solver { month: 1, day: 1, .. }));
    }

    #[rstest]
    #[case(Formulation::CapacityAware)]
    #[case(Formulation::DeployedOnly)]
    fn power_limits_hold_under_both_formulations(#[case] formulation: Formulation) {
        let mut inputs = energy_only_day([
            1.0, 30.0, 2.0, 25.0, 3.0, 28.0, 1.5, 26.0, 2.5, 27.0, 1.0, 30.0, 2.0, 25.0, 3.0,
            28.0, 1.5, 26.0, 2.5, 27.0, 1.0, 30.0, 2.0, 25.0,
        ]);
        inputs.reg_up = [0.5; HOURS];
        inputs.reg_down = [0.5; HOURS];
        inputs.missing_reg_up = [false; HOURS];
        inputs.missing_reg_down = [false; HOURS];

        let solved = solve_day(&inputs, formulation, 50.0).unwrap();
        let p = params();
        for h in &solved.schedule.hours {
            assert!(h.charge + h.reg_down_deployed <= p.q_max_r + TOL);
            assert!(h.discharge + h.reg_up_deployed <= p.q_max_d + TOL);
            assert!(h.soc >= -TOL && h.soc <= p.max_charge + TOL);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Whatever the prices and data gaps, a solved day stays inside the
        /// battery's physical envelope and never bids a missing hour.
        #[test]
        fn solved_days_respect_the_physical_envelope(
            energy in prop::collection::vec(0.01f64..100.0, HOURS),
            reg_up in prop::collection::vec(0.01f64..20.0, HOURS),
            reg_down in prop::collection::vec(0.01f64..20.0, HOURS),
            gaps in prop::collection::vec(0u8..8, HOURS),
            boundary in 0.0f64..200.0,
        ) {
            let p = params();
            let mut inputs = DayInputs::empty(1, 1);
            for h in 0..HOURS {
                inputs.missing_energy[h] = gaps[h] & 1 != 0;
                inputs.missing_reg_up[h] = gaps[h] & 2 != 0;
                inputs.missing_reg_down[h] = gaps[h] & 4 != 0;
                inputs.energy[h] = if inputs.missing_energy[h] { 0.0 } else { energy[h] };
                inputs.reg_up[h] = if inputs.missing_reg_up[h] { 0.0 } else { reg_up[h] };
                inputs.reg_down[h] = if inputs.missing_reg_down[h] { 0.0 } else { reg_down[h] };
            }

            let solved = solve_day(&inputs, Formulation::CapacityAware, boundary).unwrap();
            prop_assert!(solved.objective_value.is_finite());

            let mut prev_soc = solved.schedule.soc_start;
            prop_assert!((prev_soc - boundary).abs() < TOL);
            for (h, hour) in solved.schedule.hours.iter().enumerate() {
                prop_assert!(hour.soc >= -TOL && hour.soc <= p.max_charge + TOL);
                prop_assert!(hour.charge >= -TOL && hour.discharge >= -TOL);
                prop_assert!(hour.charge + hour.reg_down_deployed <= p.q_max_r + TOL);
                prop_assert!(hour.discharge + hour.reg_up_deployed <= p.q_max_d + TOL);
                if inputs.missing_energy[h] {
                    prop_assert!(hour.charge.abs() < TOL && hour.discharge.abs() < TOL);
                }
                if inputs.missing_reg_up[h] {
                    prop_assert!(hour.reg_up_deployed.abs() < TOL);
                }
                if inputs.missing_reg_down[h] {
                    prop_assert!(hour.reg_down_deployed.abs() < TOL);
                }
                // State-of-charge recursion holds hour over hour.
                let delta = p.lambda_c * (hour.charge - hour.discharge)
                    + p.lambda_c * (hour.reg_down_deployed - hour.reg_up_deployed);
                prop_assert!((hour.soc - (prev_soc + delta)).abs() < 1e-4);
                prev_soc = hour.soc;
            }

            // Daily throughput never exceeds one nameplate cycle per side.
            prop_assert!(solved.schedule.charge_side_total() <= p.max_charge + 1e-4);
            prop_assert!(solved.schedule.discharge_side_total() <= p.max_charge + 1e-4);
        }
    }
}
