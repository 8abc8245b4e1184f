//! Autocall snowball: periodic knock-out observation plus a downside knock-in.

use serde::{Deserialize, Serialize};

use super::checks::Checks;
use super::common::{check_all_or_none, CommonTerms};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowballConfig {
    #[serde(flatten)]
    pub common: CommonTerms,

    /// Strike applied after a knock-in.
    pub strike_price: f64,
    pub knock_o_ratio: f64,
    pub knock_i_ratio: f64,
    /// Per-observation step-down of the knock-out ratio.
    pub knock_o_steps: f64,
    /// `false` turns the note into a principal-protected snowball.
    pub knock_i_valid: bool,
    pub knock_i_occur: bool,
    /// Loss cap after knock-in, in (0, 1]; 1 passes the full downside through.
    pub knock_i_max_loss: f64,
    /// Superseded by `knock_i_max_loss`; kept on the wire, no effect.
    pub knock_i_margin_call: bool,
    pub knock_i_only_at_end: bool,
    pub knock_i_above_get: bool,
    /// Annualized client coupon; ignored when the coupon itself is solved for.
    pub coupon_rate: f64,
    /// Frame the financing cost as an option fee instead of margin.
    pub use_option_fee: bool,

    /// Fixed return when neither barrier triggers.
    pub ukiuko_coupon: f64,
    pub ukiuko_coupon_ann: bool,
    pub ukiuko_coupon_use: bool,

    /// Upside participation above the knock-out level.
    pub knock_o_p_rate: f64,
    pub knock_o_p_need: bool,

    /// Knock-out observation steps (trading days), ascending.
    pub knock_o_days: Vec<u32>,
    /// Knock-out ratio per observation, same length as `knock_o_days`.
    pub knock_o_rate: Vec<f64>,
    /// Knock-out observation dates in natural days (optional shadow).
    pub knock_o_days_n: Vec<u32>,
}

impl SnowballConfig {
    pub(crate) fn check(&self, c: &mut Checks) {
        self.common.check(c);
        let runs_step = self.common.simulation.runs_step;

        c.require(
            self.knock_o_days.len() == self.knock_o_rate.len(),
            "knock_o_rate",
            || {
                format!(
                    "length {} differs from knock_o_days ({})",
                    self.knock_o_rate.len(),
                    self.knock_o_days.len()
                )
            },
        );
        c.ascending("knock_o_days", &self.knock_o_days);
        if let Some(&bad) = self.knock_o_days.iter().find(|&&d| d == 0 || d > runs_step) {
            c.fail(
                "knock_o_days",
                format!("observation step {bad} outside 1..={runs_step}"),
            );
        }
        if let Some(bad) = self.knock_o_rate.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            c.fail("knock_o_rate", format!("ratios must be finite and > 0, got {bad}"));
        }

        c.finite("knock_o_ratio", self.knock_o_ratio);
        c.finite("knock_o_steps", self.knock_o_steps);
        if self.knock_i_valid {
            c.positive("knock_i_ratio", self.knock_i_ratio);
            c.positive("strike_price", self.strike_price);
        } else {
            c.finite("knock_i_ratio", self.knock_i_ratio);
            c.finite("strike_price", self.strike_price);
        }
        c.require(
            self.knock_i_max_loss > 0.0 && self.knock_i_max_loss <= 1.0,
            "knock_i_max_loss",
            || format!("must lie in (0, 1], got {}", self.knock_i_max_loss),
        );
        c.finite("coupon_rate", self.coupon_rate);
        c.finite("ukiuko_coupon", self.ukiuko_coupon);
        c.finite("knock_o_p_rate", self.knock_o_p_rate);

        let financing = &self.common.financing;
        if self.use_option_fee {
            c.require(financing.margin_rate == 0.0, "margin_rate", || {
                "must be 0 when use_option_fee is set".into()
            });
        } else {
            c.require(financing.option_fee == 0.0, "option_fee", || {
                "must be 0 unless use_option_fee is set".into()
            });
        }

        self.check_calendar(c);
    }

    fn check_calendar(&self, c: &mut Checks) {
        let calendar = &self.common.calendar;
        let [a, b, d] = calendar.presence();
        let presence = [a, b, ("knock_o_days_n", !self.knock_o_days_n.is_empty()), d];
        if !check_all_or_none(&presence, c) {
            return;
        }

        calendar.check_complete(self.common.simulation.runs_step, c);
        c.require(
            self.knock_o_days_n.len() == self.knock_o_days.len(),
            "knock_o_days_n",
            || {
                format!(
                    "length {} differs from knock_o_days ({})",
                    self.knock_o_days_n.len(),
                    self.knock_o_days.len()
                )
            },
        );
        c.ascending("knock_o_days_n", &self.knock_o_days_n);
        if let Some(&last) = self.knock_o_days_n.last() {
            c.require(last <= calendar.runs_step_n, "knock_o_days_n", || {
                format!("last day {last} exceeds runs_step_n {}", calendar.runs_step_n)
            });
        }
    }

    /// Knock-out ratios stepping down by `step` per observation date.
    pub fn step_down_rates(ratio: f64, step: f64, observations: usize) -> Vec<f64> {
        (0..observations).map(|i| ratio - i as f64 * step).collect()
    }

    /// Monthly schedule that holds `ratio` until `stepdown_start`, then steps
    /// down by `step` per month through month `duration`.
    ///
    /// Months are 1-based; observation starts at `observe_start`.
    pub fn step_down_schedule(
        duration: usize,
        observe_start: usize,
        stepdown_start: usize,
        ratio: f64,
        step: f64,
    ) -> Vec<f64> {
        let flat = stepdown_start.saturating_sub(observe_start + 1);
        let stepping = (duration + 2).saturating_sub(stepdown_start);
        let mut rates = vec![ratio; flat];
        rates.extend(Self::step_down_rates(ratio, step, stepping));
        rates
    }
}
