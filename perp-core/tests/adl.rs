use perp_core::prelude::*;
use rust_decimal_macros::dec;

#[test]
fn insurance_fund_exhaustion_triggers_adl_against_most_profitable_shorts_first() {
    let mut market = MarketParams::btc_perp(MarketId::new(1));
    market.liquidation_penalty_rate = Amount::ZERO;

    let mut ledger = Ledger::new();
    let long = TraderId::new(1);
    let short1 = TraderId::new(2);
    let short2 = TraderId::new(3);

    ledger.create_account(long).deposit(Amount::ZERO);
    ledger.create_account(short1).deposit(Amount::ZERO);
    ledger.create_account(short2).deposit(Amount::ZERO);

    let long_position = ledger.position_or_flat_mut(long, market.market_id);
    long_position.size = dec!(1);
    long_position.entry_price = Price::new_unchecked(dec!(50_000));
    long_position.margin = dec!(4_000);

    // S1: higher profit_score (50% pnl_percent).
    let s1 = ledger.position_or_flat_mut(short1, market.market_id);
    s1.size = dec!(-0.02);
    s1.entry_price = Price::new_unchecked(dec!(50_000));
    s1.margin = dec!(200);

    // S2: lower profit_score (20% pnl_percent), same leverage as S1.
    let s2 = ledger.position_or_flat_mut(short2, market.market_id);
    s2.size = dec!(-0.02);
    s2.entry_price = Price::new_unchecked(dec!(47_000));
    s2.margin = dec!(200);

    let mut engine = LiquidationEngine::new();
    let sink = TracingEngineEventSink::default();
    assert_eq!(engine.insurance_fund_balance(market.market_id), Amount::ZERO);

    let result = engine
        .liquidate_trader(&mut ledger, &market, dec!(45_000), long, 0, &sink)
        .expect("deeply underwater long is backstop-eligible");

    assert_eq!(result.tier, LiquidationTier::Tier3);
    assert_eq!(result.realized_pnl, dec!(-5_000));
    assert_eq!(result.bad_debt, dec!(1_000));
    assert!(ledger.position(long, market.market_id).is_none());

    let adl = result.adl.expect("insurance fund could not cover the bad debt");
    assert_eq!(adl.deficit_covered, dec!(900));
    assert_eq!(adl.deficit_remaining, dec!(100));
    assert_eq!(adl.positions_reduced, 2);

    let remaining_s1 = ledger.position(short1, market.market_id).unwrap();
    assert_eq!(remaining_s1.size, dec!(-0.01));
    assert_eq!(remaining_s1.margin, dec!(100));
    assert_eq!(ledger.account(short1).unwrap().balance, dec!(150));

    let remaining_s2 = ledger.position(short2, market.market_id).unwrap();
    assert_eq!(remaining_s2.size, dec!(-0.01));
    assert_eq!(remaining_s2.margin, dec!(100));
    assert_eq!(ledger.account(short2).unwrap().balance, dec!(120));
}

#[test]
fn candidates_are_filtered_to_profitable_opposite_side_positions() {
    let market_id = MarketId::new(1);
    let mut ledger = Ledger::new();

    let losing_short = TraderId::new(1);
    let profitable_short = TraderId::new(2);
    let same_side_long = TraderId::new(3);

    let losing = ledger.position_or_flat_mut(losing_short, market_id);
    losing.size = dec!(-1);
    losing.entry_price = Price::new_unchecked(dec!(40_000));
    losing.margin = dec!(5_000);

    let profitable = ledger.position_or_flat_mut(profitable_short, market_id);
    profitable.size = dec!(-1);
    profitable.entry_price = Price::new_unchecked(dec!(50_000));
    profitable.margin = dec!(5_000);

    let long = ledger.position_or_flat_mut(same_side_long, market_id);
    long.size = dec!(1);
    long.entry_price = Price::new_unchecked(dec!(40_000));
    long.margin = dec!(5_000);

    let candidates = AdlEngine::find_candidates(&ledger, market_id, dec!(45_000), Side::Buy);

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].trader, profitable_short);
}
