//! Property tests for the configuration model.
//!
//! Uses proptest to verify:
//! 1. Serialization stability: parse(serialize(c)) reproduces c and its bytes,
//!    for both families with arbitrary finite floats
//! 2. Fingerprint identity: equal payloads hash equally, a greek change does not
//! 3. Knock-out list lengths: any mismatch is reported on `knock_o_rate`
//! 4. Sharkfin ordering: only strictly nested double levels validate

use derivx_core::config::presets;
use derivx_core::config::{
    BarrierType, NaturalCalendar, ProductConfig, ProductFamily, SharkfinConfig,
    SnowballConfig,
};
use derivx_core::Greek;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Ratios on a 0.01 grid, so equal levels come up often.
fn arb_ratio(lo: u32, hi: u32) -> impl Strategy<Value = f64> {
    (lo..hi).prop_map(|r| r as f64 / 100.0)
}

/// Any finite double, sign and magnitude included.
fn arb_finite() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
}

fn arb_greek() -> impl Strategy<Value = Option<Greek>> {
    prop::option::of(prop::sample::select(Greek::ALL.to_vec()))
}

fn arb_seeds() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(any::<u32>(), 0..8)
}

/// Strictly ascending positive price points.
fn arb_prices() -> impl Strategy<Value = Vec<f64>> {
    (0.5f64..100.0, prop::collection::vec(0.001f64..5.0, 0..40)).prop_map(|(first, gaps)| {
        let mut prices = vec![first];
        for gap in gaps {
            let next = prices[prices.len() - 1] + gap;
            prices.push(next);
        }
        prices
    })
}

prop_compose! {
    /// Fully populated calendar over `steps` trading days.
    fn arb_calendar(steps: usize)(
        gaps in prop::collection::vec(1u32..5, steps),
        year_days_n in 360u32..367,
        settlement in 0u32..10,
    ) -> NaturalCalendar {
        let trading_days_n: Vec<u32> = gaps
            .iter()
            .scan(0u32, |day, gap| {
                *day += gap;
                Some(*day)
            })
            .collect();
        let runs_step_n = trading_days_n.last().copied().unwrap_or(0) + settlement;
        NaturalCalendar {
            runs_step_n,
            year_days_n,
            trading_days_n,
        }
    }
}

prop_compose! {
    fn arb_snowball()(
        sigma in 0.0f64..2.0,
        risk_free_rate in arb_finite(),
        knock_o_ratio in 0.8f64..1.2,
        knock_o_steps in 0.0f64..0.01,
        knock_i in 0.01f64..1.0,
        strike in 0.01f64..2.0,
        max_loss in 0.01f64..1.0,
        coupon in arb_finite(),
        ukiuko in arb_finite(),
        observations in 1usize..30,
        seeds in arb_seeds(),
        prices in arb_prices(),
        greek in arb_greek(),
        dual in any::<bool>(),
        calendar in prop::option::of(arb_calendar(488)),
    ) -> SnowballConfig {
        let mut config = presets::snowball();
        config.common.simulation.sigma = sigma;
        config.common.simulation.risk_free_rate = risk_free_rate;
        config.common.simulation.rand_seed = seeds;
        config.common.simulation.dual_smooth = dual;
        config.common.evaluation.calc_price = prices;
        config.common.evaluation.calc_greek = greek;
        config.knock_o_ratio = knock_o_ratio;
        config.knock_o_steps = knock_o_steps;
        config.knock_i_ratio = knock_i;
        config.strike_price = strike;
        config.knock_i_max_loss = max_loss;
        config.coupon_rate = coupon;
        config.ukiuko_coupon = ukiuko;
        config.knock_o_days = (1..=observations as u32).map(|i| i * 16).collect();
        config.knock_o_rate =
            SnowballConfig::step_down_rates(knock_o_ratio, knock_o_steps, observations);
        if let Some(calendar) = calendar {
            config.knock_o_days_n = config
                .knock_o_days
                .iter()
                .map(|d| calendar.trading_days_n[*d as usize - 1])
                .collect();
            config.common.calendar = calendar;
        }
        config
    }
}

prop_compose! {
    fn arb_sharkfin()(
        barrier in prop::sample::select(vec![
            BarrierType::UpCall,
            BarrierType::DownPut,
            BarrierType::Double,
        ]),
        h_l in 0.5f64..0.95,
        low_gap in 0.001f64..0.1,
        strike_gap in 0.0f64..0.2,
        high_gap in 0.001f64..0.3,
        unused in (arb_finite(), arb_finite()),
        rebates in (0.0f64..0.2, 0.0f64..0.2),
        participation in (0.0f64..3.0, 0.0f64..3.0),
        sigma in 0.0f64..2.0,
        basis_rate in arb_finite(),
        seeds in arb_seeds(),
        prices in arb_prices(),
        greek in arb_greek(),
        reverse in any::<bool>(),
        calendar in prop::option::of(arb_calendar(244)),
    ) -> SharkfinConfig {
        let mut config = presets::sharkfin_double();
        config.barrier_type = Some(barrier);
        config.reverse_knock_out = reverse;
        config.h_l = h_l;
        config.k_l = h_l + low_gap;
        config.k_h = config.k_l + strike_gap;
        config.h_h = config.k_h + high_gap;
        match barrier {
            BarrierType::UpCall => (config.h_l, config.k_l) = unused,
            BarrierType::DownPut => (config.k_h, config.h_h) = unused,
            BarrierType::Double => {}
        }
        (config.x_l, config.x_h) = rebates;
        (config.p_l, config.p_h) = participation;
        config.common.simulation.sigma = sigma;
        config.common.simulation.basis_rate = basis_rate;
        config.common.simulation.rand_seed = seeds;
        config.common.evaluation.calc_price = prices;
        config.common.evaluation.calc_greek = greek;
        config.common.calendar = calendar.unwrap_or_default();
        config
    }
}

fn arb_config() -> impl Strategy<Value = ProductConfig> {
    prop_oneof![
        arb_snowball().prop_map(ProductConfig::from),
        arb_sharkfin().prop_map(ProductConfig::from),
    ]
}

// ── 1. Serialization stability ───────────────────────────────────────

proptest! {
    #[test]
    fn roundtrip_is_stable(config in arb_config()) {
        let json = config.to_canonical_json().unwrap();
        let back = ProductConfig::parse(config.family(), &json).unwrap();
        prop_assert_eq!(&back, &config);
        prop_assert_eq!(back.to_canonical_json().unwrap(), json);
    }

    #[test]
    fn generated_configs_validate(config in arb_config()) {
        prop_assert_eq!(config.violations(), vec![]);
    }

    #[test]
    fn unused_sharkfin_levels_survive_the_wire(config in arb_sharkfin()) {
        let json = ProductConfig::from(config.clone()).to_canonical_json().unwrap();
        let back = ProductConfig::parse(ProductFamily::Sharkfin, &json).unwrap();
        let ProductConfig::Sharkfin(back) = back else {
            panic!("parsed into the wrong family");
        };
        prop_assert_eq!(
            [back.h_l.to_bits(), back.k_l.to_bits(), back.k_h.to_bits(), back.h_h.to_bits()],
            [config.h_l.to_bits(), config.k_l.to_bits(), config.k_h.to_bits(), config.h_h.to_bits()]
        );
    }
}

// ── 2. Fingerprint identity ──────────────────────────────────────────

proptest! {
    #[test]
    fn fingerprint_tracks_payload(config in arb_snowball(), greek in prop::sample::select(Greek::ALL.to_vec())) {
        let config = ProductConfig::from(config);
        prop_assert_eq!(config.fingerprint().unwrap(), config.clone().fingerprint().unwrap());

        let with = config.with_greek(Some(greek));
        let without = config.with_greek(None);
        prop_assert_ne!(with.fingerprint().unwrap(), without.fingerprint().unwrap());
    }
}

// ── 3. Knock-out list lengths ────────────────────────────────────────

proptest! {
    #[test]
    fn knock_out_length_mismatch_is_reported(days in 1usize..40, rates in 0usize..40) {
        prop_assume!(days != rates);
        let mut config = presets::snowball();
        config.knock_o_days = (1..=days as u32).map(|i| i * 12).collect();
        config.knock_o_rate = vec![1.0; rates];

        let fields: Vec<_> = ProductConfig::from(config)
            .violations()
            .into_iter()
            .map(|e| e.field)
            .collect();
        prop_assert!(fields.contains(&"knock_o_rate"));
    }
}

// ── 4. Sharkfin ordering ─────────────────────────────────────────────

proptest! {
    #[test]
    fn double_levels_validate_iff_nested(
        h_l in arb_ratio(80, 120),
        k_l in arb_ratio(80, 120),
        k_h in arb_ratio(80, 120),
        h_h in arb_ratio(80, 120),
    ) {
        let mut config = presets::sharkfin_double();
        config.h_l = h_l;
        config.k_l = k_l;
        config.k_h = k_h;
        config.h_h = h_h;

        let nested = h_l < k_l && k_l <= k_h && k_h < h_h;
        prop_assert_eq!(ProductConfig::from(config).validate().is_ok(), nested);
    }
}
