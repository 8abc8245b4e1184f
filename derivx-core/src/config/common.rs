//! Parameter blocks shared by every product family.
//!
//! Each block is `#[serde(flatten)]`-ed into the family record, so the wire
//! form stays one flat `field -> value` object.

use serde::{Deserialize, Serialize};

use super::checks::Checks;
use super::wire::greek_tag;
use super::Greek;

/// How daily price limits are applied to simulated paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PriceLimitStyle {
    /// No limit.
    #[default]
    Unlimited,
    /// The excess move is carried over to the next day.
    CarryOver,
    /// The excess move is discarded.
    Truncate,
}

impl From<PriceLimitStyle> for u8 {
    fn from(style: PriceLimitStyle) -> u8 {
        match style {
            PriceLimitStyle::Unlimited => 0,
            PriceLimitStyle::CarryOver => 1,
            PriceLimitStyle::Truncate => 2,
        }
    }
}

impl TryFrom<u8> for PriceLimitStyle {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Unlimited),
            1 => Ok(Self::CarryOver),
            2 => Ok(Self::Truncate),
            other => Err(format!("unknown price_limit_style {other}")),
        }
    }
}

/// Random source and path-simulation parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub rand_rows: u32,
    pub rand_cols: u32,
    /// Quasi-random sequences; only the first seed is used in that mode.
    pub rand_quasi: bool,
    /// One seed per compute unit at most.
    pub rand_seed: Vec<u32>,
    /// Antithetic path smoothing.
    pub dual_smooth: bool,
    pub runs_size: u64,
    pub runs_step: u32,
    pub year_days: u32,
    pub sigma: f64,
    pub risk_free_rate: f64,
    pub basis_rate: f64,
    pub price_limit_ratio: f64,
    pub price_limit_style: PriceLimitStyle,
}

impl SimulationParams {
    pub(crate) fn check(&self, c: &mut Checks) {
        c.require(self.runs_size > 0, "runs_size", || "must be > 0".into());
        c.require(self.runs_step > 0, "runs_step", || "must be > 0".into());
        c.require(self.year_days > 0, "year_days", || "must be > 0".into());
        c.non_negative("sigma", self.sigma);
        c.finite("risk_free_rate", self.risk_free_rate);
        c.finite("basis_rate", self.basis_rate);
        c.non_negative("price_limit_ratio", self.price_limit_ratio);
    }
}

/// Contract identity shared by both families.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractTerms {
    /// Carried for the record; engines price per unit of notional.
    pub notional: f64,
    pub trade_long: bool,
    pub start_price: f64,
}

impl ContractTerms {
    pub(crate) fn check(&self, c: &mut Checks) {
        c.finite("notional", self.notional);
        c.positive("start_price", self.start_price);
    }
}

/// Margin, option fee and the discount/compound switches per cash-flow leg.
///
/// The switches are independent; setting both discount and compound on one
/// leg makes the engine apply both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancingTerms {
    pub is_futures: bool,
    pub is_foreign: bool,
    pub margin_rate: f64,
    pub margin_interest: f64,
    pub option_fee: f64,
    pub option_fee_interest: f64,
    /// `false` pays the option fee up front, `true` at the end.
    pub back_end_load: bool,
    pub discount_payoff: bool,
    pub discount_margin: bool,
    pub discount_option_fee: bool,
    pub compound_option_fee: bool,
    /// Settlement delay after maturity, in trading days.
    pub extend_end_days: u32,
    pub market_close: bool,
}

impl FinancingTerms {
    pub(crate) fn check(&self, c: &mut Checks) {
        c.non_negative("margin_rate", self.margin_rate);
        c.finite("margin_interest", self.margin_interest);
        c.non_negative("option_fee", self.option_fee);
        c.finite("option_fee_interest", self.option_fee_interest);
    }
}

/// Front-end (prefix) and back-end (suffix) rebates, annualized or absolute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RebateTerms {
    pub prefix_rebate_ann_rate: f64,
    pub prefix_rebate_ann_need: bool,
    pub prefix_rebate_abs_rate: f64,
    pub prefix_rebate_abs_need: bool,
    pub suffix_rebate_ann_rate: f64,
    pub suffix_rebate_ann_need: bool,
    pub suffix_rebate_abs_rate: f64,
    pub suffix_rebate_abs_need: bool,
    /// Affects suffix rebates.
    pub discount_rebate: bool,
    /// Affects prefix rebates.
    pub compound_rebate: bool,
}

impl RebateTerms {
    pub(crate) fn check(&self, c: &mut Checks) {
        c.finite("prefix_rebate_ann_rate", self.prefix_rebate_ann_rate);
        c.finite("prefix_rebate_abs_rate", self.prefix_rebate_abs_rate);
        c.finite("suffix_rebate_ann_rate", self.suffix_rebate_ann_rate);
        c.finite("suffix_rebate_abs_rate", self.suffix_rebate_abs_rate);
    }
}

/// What to evaluate: price points, reporting window, greek selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationGrid {
    pub payoff_calc_method: i32,
    /// Surface rows, in this order.
    pub calc_price: Vec<f64>,
    /// First reported step, zero-based.
    pub run_from: u32,
    pub run_days: u32,
    #[serde(with = "greek_tag")]
    pub calc_greek: Option<Greek>,
}

impl EvaluationGrid {
    pub(crate) fn check(&self, runs_step: u32, c: &mut Checks) {
        if self.calc_price.is_empty() {
            c.fail("calc_price", "must hold at least one price point");
        } else if let Some(bad) = self.calc_price.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
            c.fail("calc_price", format!("price points must be finite and > 0, got {bad}"));
        } else {
            let ascending = self.calc_price.windows(2).all(|w| w[0] < w[1]);
            let descending = self.calc_price.windows(2).all(|w| w[0] > w[1]);
            c.require(ascending || descending, "calc_price", || {
                "must be strictly ascending or strictly descending".into()
            });
        }

        let end = u64::from(self.run_from) + u64::from(self.run_days);
        c.require(end <= u64::from(runs_step), "run_days", || {
            format!(
                "window [{}, {end}) exceeds runs_step {runs_step}",
                self.run_from
            )
        });
    }
}

/// Optional natural-day shadow calendar. All zero means "same as trading days".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NaturalCalendar {
    /// Product length in natural days, settlement delay included.
    pub runs_step_n: u32,
    pub year_days_n: u32,
    /// Natural-day number of every trading day.
    pub trading_days_n: Vec<u32>,
}

impl NaturalCalendar {
    /// Presence of each shadow field, in wire order.
    pub(crate) fn presence(&self) -> [(&'static str, bool); 3] {
        [
            ("runs_step_n", self.runs_step_n > 0),
            ("year_days_n", self.year_days_n > 0),
            ("trading_days_n", !self.trading_days_n.is_empty()),
        ]
    }

    /// Consistency of a fully specified calendar.
    pub(crate) fn check_complete(&self, runs_step: u32, c: &mut Checks) {
        c.require(
            self.trading_days_n.len() == runs_step as usize,
            "trading_days_n",
            || {
                format!(
                    "length {} differs from runs_step ({runs_step})",
                    self.trading_days_n.len()
                )
            },
        );
        c.ascending("trading_days_n", &self.trading_days_n);
        if let Some(&last) = self.trading_days_n.last() {
            c.require(last <= self.runs_step_n, "trading_days_n", || {
                format!("last day {last} exceeds runs_step_n {}", self.runs_step_n)
            });
        }
    }
}

/// Whether an all-or-nothing group of fields is consistently given.
///
/// Reports the first missing field when some but not all are present.
pub(crate) fn check_all_or_none(presence: &[(&'static str, bool)], c: &mut Checks) -> bool {
    let given: Vec<&str> = presence.iter().filter(|(_, p)| *p).map(|(f, _)| *f).collect();
    if given.is_empty() {
        return false;
    }
    if let Some(&(missing, _)) = presence.iter().find(|(_, p)| !*p) {
        c.fail(
            missing,
            format!(
                "natural-day fields must be given together ({} set, {missing} missing)",
                given.join(", ")
            ),
        );
        return false;
    }
    true
}

/// Blocks every family embeds, flattened in wire order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonTerms {
    #[serde(flatten)]
    pub simulation: SimulationParams,
    #[serde(flatten)]
    pub contract: ContractTerms,
    #[serde(flatten)]
    pub financing: FinancingTerms,
    #[serde(flatten)]
    pub rebates: RebateTerms,
    #[serde(flatten)]
    pub evaluation: EvaluationGrid,
    #[serde(flatten)]
    pub calendar: NaturalCalendar,
}

impl CommonTerms {
    pub(crate) fn check(&self, c: &mut Checks) {
        self.simulation.check(c);
        self.contract.check(c);
        self.financing.check(c);
        self.rebates.check(c);
        self.evaluation.check(self.simulation.runs_step, c);
    }
}
