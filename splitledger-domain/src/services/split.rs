//! Share computation for a single expense.
//!
//! Shares are exact: for every valid input the computed shares sum to the
//! expense amount with no rounding leakage, for both rules.

use std::{cmp::Reverse, collections::BTreeMap};

use fxhash::FxHashSet;

use crate::{
    error::InvalidSplitError,
    model::{MemberId, Money, SplitRule},
};

/// Computes each participant's owed share of `amount` under `rule`.
///
/// `participants` must already be in canonical group order with no
/// duplicates; remainder units are handed out by that order, so the same
/// input always produces the same shares.
pub fn compute_shares(
    amount: Money,
    rule: &SplitRule,
    participants: &[MemberId],
) -> Result<BTreeMap<MemberId, Money>, InvalidSplitError> {
    if !amount.is_positive() {
        return Err(InvalidSplitError::NonPositiveAmount(amount));
    }
    if participants.is_empty() {
        return Err(InvalidSplitError::NoParticipants);
    }
    let mut seen = FxHashSet::default();
    for &id in participants {
        if !seen.insert(id) {
            return Err(InvalidSplitError::DuplicateParticipant(id));
        }
    }
    if let SplitRule::Percentage(weights) = rule {
        if weights.len() != participants.len()
            || participants.iter().any(|id| !weights.contains_key(id))
        {
            return Err(InvalidSplitError::WeightSetMismatch);
        }
        let total: u32 = weights.values().sum();
        if total != 100 {
            return Err(InvalidSplitError::WeightSumMismatch(total));
        }
    }
    Ok(apportion(amount, rule, participants))
}

/// Splits an already-validated expense. Callers must uphold the
/// `compute_shares` preconditions; the ledger relies on this being
/// infallible when replaying stored expenses.
pub(crate) fn apportion(
    amount: Money,
    rule: &SplitRule,
    participants: &[MemberId],
) -> BTreeMap<MemberId, Money> {
    let total = amount.amount();
    let mut shares: BTreeMap<MemberId, Money> = BTreeMap::new();

    match rule {
        SplitRule::Equal => {
            let count = participants.len() as i64;
            let base = total / count;
            let remainder = (total % count) as usize;
            for (idx, &member) in participants.iter().enumerate() {
                let mut share = base;
                if idx < remainder {
                    share += 1;
                }
                shares.insert(member, Money::from_i64(share));
            }
        }
        SplitRule::Percentage(weights) => {
            // i128 keeps amount * weight exact for any i64 amount.
            let mut fractions: Vec<(Reverse<i128>, usize, MemberId)> =
                Vec::with_capacity(participants.len());
            let mut distributed = 0_i64;
            for (idx, &member) in participants.iter().enumerate() {
                let weight = i128::from(weights[&member]);
                let exact = i128::from(total) * weight;
                let share = (exact / 100) as i64;
                distributed += share;
                fractions.push((Reverse(exact % 100), idx, member));
            }
            // Largest fractional remainder first, participant order on ties.
            fractions.sort_unstable();
            let leftover = (total - distributed) as usize;
            for (idx, (_, _, member)) in fractions.into_iter().enumerate() {
                let weight = i128::from(weights[&member]);
                let mut share = (i128::from(total) * weight / 100) as i64;
                if idx < leftover {
                    share += 1;
                }
                shares.insert(member, Money::from_i64(share));
            }
        }
    }

    debug_assert_eq!(
        shares.values().copied().sum::<Money>(),
        amount,
        "shares must sum exactly to the expense amount"
    );
    shares
}
