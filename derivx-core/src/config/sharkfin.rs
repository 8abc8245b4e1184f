//! Barrier sharkfin: a vanilla payoff cancelled (with optional rebate) once a
//! barrier is crossed.

use serde::{Deserialize, Serialize};

use super::checks::Checks;
use super::common::{check_all_or_none, CommonTerms};
use super::wire::{optional_code, WireCode};

/// Exercise style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionStyle {
    European,
    American,
}

impl WireCode for OptionStyle {
    const NAME: &'static str = "option_type";

    fn code(self) -> u8 {
        match self {
            Self::European => 1,
            Self::American => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::European),
            2 => Some(Self::American),
            _ => None,
        }
    }
}

/// Barrier structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierType {
    /// Up-and-out call.
    UpCall,
    /// Down-and-out put.
    DownPut,
    /// Up-and-out call plus down-and-out put.
    Double,
}

impl WireCode for BarrierType {
    const NAME: &'static str = "barrier_type";

    fn code(self) -> u8 {
        match self {
            Self::UpCall => 1,
            Self::DownPut => 2,
            Self::Double => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::UpCall),
            2 => Some(Self::DownPut),
            3 => Some(Self::Double),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharkfinConfig {
    #[serde(flatten)]
    pub common: CommonTerms,

    #[serde(with = "optional_code")]
    pub option_type: Option<OptionStyle>,
    #[serde(with = "optional_code")]
    pub barrier_type: Option<BarrierType>,
    /// Single-barrier only; masked for double structures.
    pub reverse_knock_out: bool,
    /// Exercise payoff is absolute rather than annualized.
    pub strike_payoff_abs: bool,

    /// Barrier ratios relative to `start_price`.
    pub h_l: f64,
    pub h_h: f64,
    /// Strike ratios relative to `start_price`.
    pub k_l: f64,
    pub k_h: f64,
    /// Annualized rebate paid after knock-out.
    pub x_l: f64,
    pub x_h: f64,
    /// Participation when no knock-out occurs.
    pub p_l: f64,
    pub p_h: f64,

    /// Pay the knock-out rebate at maturity instead of immediately.
    pub is_kop_delay: bool,
    pub knock_o_occur: bool,
    /// Price at which a past knock-out happened.
    pub knock_o_point: f64,

    /// Share of the option fee consumed by hedging.
    pub consumed_option_fee_rate: f64,
    /// Share of the option fee occupied by hedging.
    pub occupied_option_fee_rate: f64,
}

impl SharkfinConfig {
    /// `reverse_knock_out` as the engine sees it.
    pub fn effective_reverse_knock_out(&self) -> bool {
        self.reverse_knock_out && self.barrier_type != Some(BarrierType::Double)
    }

    pub(crate) fn check(&self, c: &mut Checks) {
        self.common.check(c);

        c.require(self.option_type.is_some(), "option_type", || {
            "must be european (1) or american (2)".into()
        });
        // Every level reaches the wire, including the ones a single barrier ignores.
        let mut levels_finite = true;
        for (field, value) in [
            ("h_l", self.h_l),
            ("k_l", self.k_l),
            ("k_h", self.k_h),
            ("h_h", self.h_h),
        ] {
            levels_finite &= c.finite(field, value);
        }
        match self.barrier_type {
            None => c.fail("barrier_type", "must be up-call (1), down-put (2) or double (3)"),
            Some(barrier) if levels_finite => self.check_ordering(barrier, c),
            Some(_) => {}
        }

        for (field, value) in [
            ("x_l", self.x_l),
            ("x_h", self.x_h),
            ("p_l", self.p_l),
            ("p_h", self.p_h),
            ("knock_o_point", self.knock_o_point),
            ("consumed_option_fee_rate", self.consumed_option_fee_rate),
            ("occupied_option_fee_rate", self.occupied_option_fee_rate),
        ] {
            c.non_negative(field, value);
        }

        let calendar = &self.common.calendar;
        if check_all_or_none(&calendar.presence(), c) {
            calendar.check_complete(self.common.simulation.runs_step, c);
        }
    }

    fn check_ordering(&self, barrier: BarrierType, c: &mut Checks) {
        let (h_l, k_l, k_h, h_h) = (self.h_l, self.k_l, self.k_h, self.h_h);
        match barrier {
            BarrierType::UpCall => {
                c.positive("k_h", k_h);
                c.require(k_h < h_h, "h_h", || {
                    format!("up-call needs k_h < h_h, got k_h={k_h} h_h={h_h}")
                });
            }
            BarrierType::DownPut => {
                c.positive("h_l", h_l);
                c.require(h_l < k_l, "h_l", || {
                    format!("down-put needs h_l < k_l, got h_l={h_l} k_l={k_l}")
                });
            }
            BarrierType::Double => {
                c.positive("h_l", h_l);
                c.require(h_l < k_l, "h_l", || {
                    format!("double needs h_l < k_l, got h_l={h_l} k_l={k_l}")
                });
                c.require(k_l <= k_h, "k_h", || {
                    format!("double needs k_l <= k_h, got k_l={k_l} k_h={k_h}")
                });
                c.require(k_h < h_h, "h_h", || {
                    format!("double needs k_h < h_h, got k_h={k_h} h_h={h_h}")
                });
            }
        }
    }
}
