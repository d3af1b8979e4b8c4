//! Exact settlement arithmetic on raw token units.
//!
//! Nothing here touches the ledger; resolution feeds these functions the
//! rows it loaded and writes back what they return.

use std::collections::BTreeMap;

use plotline_types::{BetId, TokenAmount, TokenMap, TokenType};

use crate::MarketError;

/// Split a gross stake into `(fee, net)`. The fee is rounded half-up.
pub fn fee_split(gross: TokenAmount, fee_bps: u32) -> Result<(TokenAmount, TokenAmount), MarketError> {
    let fee = gross.mul_bps_round(fee_bps).ok_or(MarketError::Overflow)?;
    let net = gross.checked_sub(fee).ok_or(MarketError::Overflow)?;
    Ok((fee, net))
}

/// Divide `amount` into `parts` shares that differ by at most one raw unit.
/// The first `amount % parts` shares carry the extra unit.
pub fn spread_evenly(amount: TokenAmount, parts: usize) -> Vec<TokenAmount> {
    if parts == 0 {
        return Vec::new();
    }
    let n = parts as u128;
    let base = amount.raw() / n;
    let remainder = (amount.raw() % n) as usize;
    (0..parts)
        .map(|i| TokenAmount::new(base + u128::from(i < remainder)))
        .collect()
}

/// One winning stake fed into [`plan_distribution`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WinningStake {
    pub bet_id: BetId,
    pub token: TokenType,
    pub amount: TokenAmount,
}

/// How one chapter's pot is divided.
///
/// Per token: `distributed + treasury_cut + rolled_over == pot`, with
/// `dust` already included in `treasury_cut`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistributionPlan {
    /// Payout for every winning bet, zero included.
    pub payouts: BTreeMap<BetId, TokenAmount>,
    pub distributed: TokenMap,
    pub treasury_cut: TokenMap,
    /// Sub-unit remainder of the winner share left after flooring each payout.
    pub dust: TokenMap,
    /// Pot in tokens the winning pool holds no stake in.
    pub rolled_over: TokenMap,
}

/// Divide every token of `pot` among `stakes` pari-mutuel style.
///
/// The winner share is `floor(pot × winner_bps / 10 000)` and the treasury
/// takes the rest. Each stake receives
/// `floor(amount × winner_share / winning_stake)`; the flooring dust goes to
/// the treasury cut.
pub fn plan_distribution(
    pot: &TokenMap,
    stakes: &[WinningStake],
    winner_bps: u32,
) -> Result<DistributionPlan, MarketError> {
    let mut plan = DistributionPlan::default();

    for (token, total) in pot.iter() {
        let winning: Vec<&WinningStake> = stakes.iter().filter(|s| s.token == token).collect();
        let winning_stake = winning
            .iter()
            .try_fold(TokenAmount::ZERO, |acc, s| acc.checked_add(s.amount))
            .ok_or(MarketError::Overflow)?;

        if winning_stake.is_zero() {
            plan.rolled_over.set(token, total);
            continue;
        }

        let winner_share = total.mul_bps_floor(winner_bps).ok_or(MarketError::Overflow)?;
        let treasury_share = total.checked_sub(winner_share).ok_or(MarketError::Overflow)?;

        let mut paid = TokenAmount::ZERO;
        for stake in winning {
            let amount = stake
                .amount
                .mul_div_floor(winner_share, winning_stake)
                .ok_or(MarketError::Overflow)?;
            paid = paid.checked_add(amount).ok_or(MarketError::Overflow)?;
            plan.payouts.insert(stake.bet_id, amount);
        }

        let dust = winner_share.checked_sub(paid).ok_or(MarketError::Overflow)?;
        plan.distributed.set(token, paid);
        plan.dust.set(token, dust);
        plan.treasury_cut.set(
            token,
            treasury_share.checked_add(dust).ok_or(MarketError::Overflow)?,
        );
    }

    Ok(plan)
}
