//! Reference products: a two-year autocall snowball and a one-year double
//! sharkfin, with the market and simulation settings desks start from.

use super::common::{
    CommonTerms, ContractTerms, EvaluationGrid, FinancingTerms, SimulationParams,
};
use super::sharkfin::{BarrierType, OptionStyle, SharkfinConfig};
use super::snowball::SnowballConfig;
use super::price_ladder;

/// Monthly knock-out observation steps over 488 trading days.
pub const SNOWBALL_OBSERVATIONS: [u32; 22] = [
    61, 81, 101, 122, 142, 162, 183, 203, 223, 244, 264, 284, 305, 325, 345, 366, 386, 406, 427,
    447, 467, 488,
];

fn simulation(rand_cols: u32, runs_step: u32, basis_rate: f64) -> SimulationParams {
    SimulationParams {
        rand_rows: 50_000,
        rand_cols,
        rand_quasi: false,
        rand_seed: (0..8).collect(),
        dual_smooth: true,
        runs_size: 100_000,
        runs_step,
        year_days: 244,
        sigma: 0.16,
        risk_free_rate: 0.03,
        basis_rate,
        price_limit_ratio: 0.1,
        ..Default::default()
    }
}

fn first_day(low: f64, high: f64) -> EvaluationGrid {
    EvaluationGrid {
        calc_price: price_ladder(low, high, 1.0),
        run_from: 0,
        run_days: 1,
        ..Default::default()
    }
}

/// Two-year snowball: 100% knock-out, 70% knock-in, 11% coupon, full margin.
pub fn snowball() -> SnowballConfig {
    let knock_o_ratio = 1.0;
    let knock_o_steps = 0.0;
    SnowballConfig {
        common: CommonTerms {
            simulation: simulation(500, 488, 0.05),
            contract: ContractTerms {
                notional: 100_000.0,
                trade_long: false,
                start_price: 100.0,
            },
            financing: FinancingTerms {
                margin_rate: 1.0,
                margin_interest: 0.03,
                option_fee_interest: 0.03,
                ..Default::default()
            },
            evaluation: first_day(65.0, 105.0),
            ..Default::default()
        },
        strike_price: 100.0,
        knock_o_ratio,
        knock_i_ratio: 0.7,
        knock_o_steps,
        knock_i_valid: true,
        knock_i_max_loss: 1.0,
        knock_i_margin_call: true,
        coupon_rate: 0.11,
        knock_o_days: SNOWBALL_OBSERVATIONS.to_vec(),
        knock_o_rate: SnowballConfig::step_down_rates(
            knock_o_ratio,
            knock_o_steps,
            SNOWBALL_OBSERVATIONS.len(),
        ),
        ..Default::default()
    }
}

/// One-year American double sharkfin: barriers 95%/105%, strikes 99%/101%.
pub fn sharkfin_double() -> SharkfinConfig {
    SharkfinConfig {
        common: CommonTerms {
            simulation: simulation(250, 244, 0.06),
            contract: ContractTerms {
                notional: 100_000.0,
                trade_long: false,
                start_price: 100.0,
            },
            financing: FinancingTerms {
                option_fee: 0.035,
                option_fee_interest: 0.03,
                ..Default::default()
            },
            evaluation: first_day(90.0, 110.0),
            ..Default::default()
        },
        option_type: Some(OptionStyle::American),
        barrier_type: Some(BarrierType::Double),
        h_l: 0.95,
        h_h: 1.05,
        k_l: 0.99,
        k_h: 1.01,
        x_l: 0.035,
        x_h: 0.035,
        p_l: 1.0,
        p_h: 1.0,
        is_kop_delay: true,
        ..Default::default()
    }
}
