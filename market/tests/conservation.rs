//! Property tests: value is never created or destroyed by settlement.

use proptest::prelude::*;

use plotline_market::split::{fee_split, plan_distribution, WinningStake};
use plotline_market::{MarketEngine, OpenChapter, OutcomeSpec, PlaceBet};
use plotline_nullables::{NullClock, NullLedgerStore};
use plotline_store::{LedgerRead, LedgerStore};
use plotline_types::{
    BetId, ChapterId, MarketParams, OutcomeId, TokenAmount, TokenMap, TokenType, Timestamp,
    UserId, BPS_DENOMINATOR,
};

fn token() -> impl Strategy<Value = TokenType> {
    prop_oneof![Just(TokenType::Usdc), Just(TokenType::Usdt)]
}

/// (user index, outcome index, token, gross raw amount)
fn bets() -> impl Strategy<Value = Vec<(u8, u8, TokenType, u128)>> {
    prop::collection::vec((0u8..6, 0u8..3, token(), 1u128..5_000_000_000), 0..40)
}

proptest! {
    #[test]
    fn fee_split_is_exact(gross in 1u128..u64::MAX as u128, fee_bps in 0u32..BPS_DENOMINATOR) {
        let (fee, net) = fee_split(TokenAmount::new(gross), fee_bps).unwrap();
        prop_assert_eq!(fee.raw() + net.raw(), gross);
        prop_assert!(fee.raw() <= gross);
    }

    #[test]
    fn distribution_never_exceeds_pot(
        pot in 0u128..1_000_000_000_000,
        stakes in prop::collection::vec(1u128..1_000_000_000, 1..20),
        winner_bps in 0u32..=BPS_DENOMINATOR,
    ) {
        let winning: Vec<WinningStake> = stakes
            .iter()
            .enumerate()
            .map(|(i, &amount)| WinningStake {
                bet_id: BetId::new(i as u64 + 1),
                token: TokenType::Usdc,
                amount: TokenAmount::new(amount),
            })
            .collect();
        let pot_map = TokenMap::single(TokenType::Usdc, TokenAmount::new(pot));
        let plan = plan_distribution(&pot_map, &winning, winner_bps).unwrap();

        let paid: u128 = plan.payouts.values().map(|a| a.raw()).sum();
        prop_assert_eq!(paid, plan.distributed.get(TokenType::Usdc).raw());
        prop_assert_eq!(
            paid + plan.treasury_cut.get(TokenType::Usdc).raw(),
            pot
        );
        // Flooring loses less than one raw unit per payout.
        prop_assert!(plan.dust.get(TokenType::Usdc).raw() < stakes.len() as u128);
    }

    #[test]
    fn larger_stake_never_earns_less(
        a in 1u128..1_000_000_000,
        b in 1u128..1_000_000_000,
        pot in 1u128..1_000_000_000_000,
    ) {
        let winning = [
            WinningStake { bet_id: BetId::new(1), token: TokenType::Usdt, amount: TokenAmount::new(a) },
            WinningStake { bet_id: BetId::new(2), token: TokenType::Usdt, amount: TokenAmount::new(b) },
        ];
        let pot_map = TokenMap::single(TokenType::Usdt, TokenAmount::new(pot));
        let plan = plan_distribution(&pot_map, &winning, 8_500).unwrap();
        let pa = plan.payouts[&BetId::new(1)];
        let pb = plan.payouts[&BetId::new(2)];
        if a >= b {
            prop_assert!(pa >= pb);
        } else {
            prop_assert!(pa <= pb);
        }
    }

    #[test]
    fn payouts_are_proportional_up_to_flooring(
        a in 1u128..1_000_000_000,
        b in 1u128..1_000_000_000,
        others in prop::collection::vec(1u128..1_000_000_000, 0..6),
        pot in 1u128..1_000_000_000_000,
        winner_bps in 0u32..=BPS_DENOMINATOR,
    ) {
        let winning: Vec<WinningStake> = [a, b]
            .iter()
            .chain(others.iter())
            .enumerate()
            .map(|(i, &amount)| WinningStake {
                bet_id: BetId::new(i as u64 + 1),
                token: TokenType::Usdc,
                amount: TokenAmount::new(amount),
            })
            .collect();
        let pot_map = TokenMap::single(TokenType::Usdc, TokenAmount::new(pot));
        let plan = plan_distribution(&pot_map, &winning, winner_bps).unwrap();
        let pa = plan.payouts[&BetId::new(1)].raw();
        let pb = plan.payouts[&BetId::new(2)].raw();

        // payout(A) / payout(B) == amount(A) / amount(B), short of one raw
        // unit of flooring on each side.
        let lhs = pa * b;
        let rhs = pb * a;
        prop_assert!(lhs.abs_diff(rhs) < a + b);
    }

    #[test]
    fn resolved_chapter_balances(placed in bets(), winner in 0u64..3) {
        let engine = MarketEngine::new(
            NullLedgerStore::new(),
            NullClock::new(0),
            MarketParams::default(),
        )
        .unwrap();
        engine
            .open_chapter(OpenChapter {
                chapter_id: ChapterId::new(1),
                deadline: Timestamp::new(10),
                outcomes: (0..3)
                    .map(|i| OutcomeSpec { id: OutcomeId::new(i), label: String::new() })
                    .collect(),
                carryover_from: None,
            })
            .unwrap();

        let mut gross = TokenMap::new();
        for (n, (user, outcome, token, amount)) in placed.iter().enumerate() {
            engine
                .place_bet(PlaceBet {
                    user: UserId::new(format!("user-{user}")),
                    outcome_id: OutcomeId::new(*outcome as u64),
                    gross_amount: TokenAmount::new(*amount),
                    token: *token,
                    tx_ref: format!("tx-{n}"),
                })
                .unwrap();
            gross.checked_add(*token, TokenAmount::new(*amount)).unwrap();
        }

        engine.clock().set(11);
        engine.close_betting_for_chapter(ChapterId::new(1)).unwrap();
        let summary = engine
            .resolve_pool(ChapterId::new(1), OutcomeId::new(winner))
            .unwrap();

        let audit = engine.chapter_audit(ChapterId::new(1)).unwrap();
        prop_assert!(audit.is_balanced());

        // Every gross unit deposited is a fee, a payout, a cut or rollover.
        let mut accounted = audit.fees.clone();
        accounted.checked_merge(&audit.payouts).unwrap();
        accounted.checked_merge(&audit.treasury_cut).unwrap();
        accounted.checked_merge(&audit.rollover).unwrap();
        prop_assert_eq!(accounted, gross);

        let reader = engine.store().read_txn().unwrap();
        let payouts = reader.pool_payouts(summary.winning_pool).unwrap();
        prop_assert_eq!(payouts.len(), summary.payouts_created);
    }
}
