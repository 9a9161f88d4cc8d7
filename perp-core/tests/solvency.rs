//! Solvency invariant tests: properties that must hold for the exchange to
//! remain solvent regardless of the specific trades/prices involved.

use perp_core::prelude::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn trade(trader: TraderId, side: Side, price: Decimal, qty: Decimal, role: TradeRole) -> Trade {
    Trade {
        trade_id: TradeId::new(1),
        market_id: MarketId::new(1),
        role,
        order_id: OrderId::new(1),
        trader,
        side,
        price: Price::new_unchecked(price),
        quantity: Quantity::new_unchecked(qty),
        created_at: 0,
        realized_pnl: Amount::ZERO,
        fee: Amount::ZERO,
    }
}

proptest! {
    /// Z1: closing a position against the exact counterparty that opened it
    /// realizes equal and opposite PnL on both legs, for any entry/exit
    /// price and size.
    #[test]
    fn settlement_is_zero_sum_for_a_closed_pair(
        open_price in 10_000i64..100_000i64,
        close_price in 10_000i64..100_000i64,
        qty_hundredths in 1i64..10_000i64,
    ) {
        let market = MarketParams::btc_perp(MarketId::new(1));
        let mut ledger = Ledger::new();
        ledger.create_account(TraderId::new(1)).deposit(dec!(10_000_000));
        ledger.create_account(TraderId::new(2)).deposit(dec!(10_000_000));
        let sink = TracingEngineEventSink::default();

        let open = Decimal::from(open_price);
        let close = Decimal::from(close_price);
        let qty = Decimal::new(qty_hundredths, 2);

        let balance_before_1 = ledger.account(TraderId::new(1)).unwrap().balance;
        let balance_before_2 = ledger.account(TraderId::new(2)).unwrap().balance;

        let mut maker = trade(TraderId::new(1), Side::Sell, open, qty, TradeRole::Maker);
        let mut taker = trade(TraderId::new(2), Side::Buy, open, qty, TradeRole::Taker);
        SettlementEngine::settle_trade_pair(&mut ledger, &market, &mut maker, &mut taker, &sink).unwrap();

        let mut maker2 = trade(TraderId::new(2), Side::Sell, close, qty, TradeRole::Maker);
        let mut taker2 = trade(TraderId::new(1), Side::Buy, close, qty, TradeRole::Taker);
        SettlementEngine::settle_trade_pair(&mut ledger, &market, &mut maker2, &mut taker2, &sink).unwrap();

        prop_assert_eq!(maker2.realized_pnl + taker2.realized_pnl, Amount::ZERO);

        // Z1: once flat again, each account's balance is its pre-trade
        // balance plus realized PnL minus fees paid across both legs; no
        // margin is left stranded in locked_margin.
        let fees_1 = maker.fee + taker2.fee;
        let fees_2 = taker.fee + maker2.fee;
        let expected_1 = balance_before_1 + maker.realized_pnl + taker2.realized_pnl - fees_1;
        let expected_2 = balance_before_2 + taker.realized_pnl + maker2.realized_pnl - fees_2;
        prop_assert_eq!(ledger.account(TraderId::new(1)).unwrap().balance, expected_1.max(Amount::ZERO));
        prop_assert_eq!(ledger.account(TraderId::new(2)).unwrap().balance, expected_2.max(Amount::ZERO));
        prop_assert_eq!(ledger.account(TraderId::new(1)).unwrap().locked_margin, Amount::ZERO);
        prop_assert_eq!(ledger.account(TraderId::new(2)).unwrap().locked_margin, Amount::ZERO);
    }

    /// A1: after any sequence of opens/increases/closes between two
    /// accounts, each account's `locked_margin` equals the sum of its open
    /// positions' margin.
    #[test]
    fn locked_margin_matches_open_position_margin_after_settlement(
        open_price in 10_000i64..100_000i64,
        second_price in 10_000i64..100_000i64,
        qty_hundredths in 1i64..10_000i64,
        second_qty_hundredths in 1i64..10_000i64,
    ) {
        let market = MarketParams::btc_perp(MarketId::new(1));
        let mut ledger = Ledger::new();
        ledger.create_account(TraderId::new(1)).deposit(dec!(10_000_000));
        ledger.create_account(TraderId::new(2)).deposit(dec!(10_000_000));
        let sink = TracingEngineEventSink::default();

        let open = Decimal::from(open_price);
        let second = Decimal::from(second_price);
        let qty = Decimal::new(qty_hundredths, 2);
        let second_qty = Decimal::new(second_qty_hundredths, 2);

        let mut maker = trade(TraderId::new(1), Side::Sell, open, qty, TradeRole::Maker);
        let mut taker = trade(TraderId::new(2), Side::Buy, open, qty, TradeRole::Taker);
        SettlementEngine::settle_trade_pair(&mut ledger, &market, &mut maker, &mut taker, &sink).unwrap();

        // A second, independent fill between the same pair, which may open,
        // add to, reduce, or flip either side's position.
        let mut maker2 = trade(TraderId::new(1), Side::Sell, second, second_qty, TradeRole::Maker);
        let mut taker2 = trade(TraderId::new(2), Side::Buy, second, second_qty, TradeRole::Taker);
        let _ = SettlementEngine::settle_trade_pair(&mut ledger, &market, &mut maker2, &mut taker2, &sink);

        prop_assert!(ledger.check_margin_invariant().is_ok());
    }

    /// F1: the insurance fund balance never goes negative no matter how
    /// large or how many debits it takes.
    #[test]
    fn insurance_fund_balance_never_negative(
        credits in proptest::collection::vec(0i64..100_000i64, 0..10),
        debits in proptest::collection::vec(0i64..200_000i64, 0..10),
    ) {
        let mut fund = InsuranceFund::default();
        for amount in credits {
            fund.credit(Decimal::from(amount));
        }
        for amount in debits {
            let _ = fund.debit(Decimal::from(amount));
        }
        prop_assert!(fund.balance >= Amount::ZERO);
    }

    /// Funding payments are zero-sum across a matched long/short pair for
    /// any mark/index spread and position size.
    #[test]
    fn funding_settlement_is_zero_sum(
        mark_offset in -2_000i64..2_000i64,
        size_hundredths in 1i64..10_000i64,
    ) {
        let market = MarketParams::btc_perp(MarketId::new(1));
        let mut ledger = Ledger::new();
        ledger.create_account(TraderId::new(1)).deposit(dec!(10_000_000));
        ledger.create_account(TraderId::new(2)).deposit(dec!(10_000_000));

        let size = Decimal::new(size_hundredths, 2);
        let index = dec!(50_000);
        let mark = index + Decimal::from(mark_offset);

        let long = ledger.position_or_flat_mut(TraderId::new(1), market.market_id);
        long.size = size;
        long.entry_price = Price::new_unchecked(index);
        long.margin = dec!(1_000_000);

        let short = ledger.position_or_flat_mut(TraderId::new(2), market.market_id);
        short.size = -size;
        short.entry_price = Price::new_unchecked(index);
        short.margin = dec!(1_000_000);

        let sink = TracingEngineEventSink::default();
        let balance_before_1 = ledger.account(TraderId::new(1)).unwrap().balance;
        let balance_before_2 = ledger.account(TraderId::new(2)).unwrap().balance;

        FundingEngine::settle(&mut ledger, &market, mark, index, &sink);

        let delta_1 = ledger.account(TraderId::new(1)).unwrap().balance - balance_before_1;
        let delta_2 = ledger.account(TraderId::new(2)).unwrap().balance - balance_before_2;
        prop_assert_eq!(delta_1 + delta_2, Amount::ZERO);
    }

    /// A liquidation never closes more than the position's full size, and
    /// never releases more margin than the position held.
    #[test]
    fn liquidation_never_over_closes_a_position(
        size_hundredths in 1i64..2_000i64,
        margin_amount in 100i64..1_000_000i64,
        mark_offset in -20_000i64..20_000i64,
    ) {
        let market = MarketParams::btc_perp(MarketId::new(1));
        let entry = dec!(50_000);
        let mark = (entry + Decimal::from(mark_offset)).max(dec!(1));

        let mut ledger = Ledger::new();
        let trader = TraderId::new(1);
        ledger.create_account(trader).deposit(Amount::ZERO);
        let position = ledger.position_or_flat_mut(trader, market.market_id);
        position.size = Decimal::new(size_hundredths, 2);
        position.entry_price = Price::new_unchecked(entry);
        position.margin = Decimal::from(margin_amount);
        let original_size = position.size;
        let original_margin = position.margin;

        let mut engine = LiquidationEngine::new();
        let sink = TracingEngineEventSink::default();

        if let Ok(result) = engine.liquidate_trader(&mut ledger, &market, mark, trader, 0, &sink) {
            prop_assert!(result.closed_quantity <= original_size.abs());
            let remaining_margin = ledger
                .position(trader, market.market_id)
                .map(|p| p.margin)
                .unwrap_or(Amount::ZERO);
            prop_assert!(remaining_margin <= original_margin);
            prop_assert!(remaining_margin >= Amount::ZERO);
        }
    }
}
