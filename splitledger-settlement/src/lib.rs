#![warn(clippy::uninlined_format_args)]

//! Debt simplification for a closed group of balances.
//!
//! Given per-member net positions that sum to zero, [`settle_balances`]
//! produces an ordered payment list that zeroes every position using greedy
//! largest-creditor/largest-debtor matching. The greedy plan is the standard
//! approximation for this problem; it emits at most `members - 1` payments
//! but is not guaranteed to be the true minimum transaction count in every
//! topology (finding that minimum is combinatorially hard).

mod model;

use std::{
    cmp::{Ordering, Reverse},
    collections::{BTreeMap, BinaryHeap},
};

use thiserror::Error;

pub use model::{Payment, PersonBalance};

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Sum of balances must be zero (found {0})")]
    ImbalancedTotal(i64),
}

/// Collapses pairwise debts into one net position per member.
///
/// Each entry is `(debtor, creditor, amount)` with a positive amount meaning
/// the debtor owes the creditor; negative amounts flip the direction. The
/// pairwise detail is discarded on purpose — who originally owed whom is
/// irrelevant to minimizing the payment count.
pub fn net_positions<Id>(pairs: impl IntoIterator<Item = (Id, Id, i64)>) -> BTreeMap<Id, i64>
where
    Id: Copy + Ord,
{
    let mut positions: BTreeMap<Id, i64> = BTreeMap::new();
    for (debtor, creditor, amount) in pairs {
        *positions.entry(creditor).or_insert(0) += amount;
        *positions.entry(debtor).or_insert(0) -= amount;
    }
    positions
}

/// Produces an ordered payment list that fully settles the given positions.
///
/// Repeatedly matches the largest outstanding creditor with the largest
/// outstanding debtor (ties broken by the smaller id, so plans are
/// deterministic), settles `min(credit, debt)` and drops whichever side
/// reaches zero. The balances must sum to zero; anything else means the
/// caller's ledger is corrupt and is rejected up front.
pub fn settle_balances<Id>(
    people: impl IntoIterator<Item = PersonBalance<Id>>,
) -> Result<Vec<Payment<Id>>, SettlementError>
where
    Id: Copy + Ord,
{
    let people: Vec<PersonBalance<Id>> = people.into_iter().collect();
    let total: i64 = people.iter().map(|person| person.balance).sum();
    if total != 0 {
        return Err(SettlementError::ImbalancedTotal(total));
    }

    // Max-heaps keyed (amount, Reverse(id)): largest amount first, smallest
    // id on equal amounts.
    let mut creditors: BinaryHeap<(i64, Reverse<Id>)> = BinaryHeap::new();
    let mut debtors: BinaryHeap<(i64, Reverse<Id>)> = BinaryHeap::new();
    for person in &people {
        match person.balance.cmp(&0) {
            Ordering::Greater => creditors.push((person.balance, Reverse(person.id))),
            Ordering::Less => debtors.push((-person.balance, Reverse(person.id))),
            Ordering::Equal => {}
        }
    }

    let mut payments = Vec::with_capacity(people.len().saturating_sub(1));
    while let (Some((credit, Reverse(creditor))), Some((debt, Reverse(debtor)))) =
        (creditors.pop(), debtors.pop())
    {
        let amount = credit.min(debt);
        payments.push(Payment {
            from: debtor,
            to: creditor,
            amount,
        });
        if credit > amount {
            creditors.push((credit - amount, Reverse(creditor)));
        }
        if debt > amount {
            debtors.push((debt - amount, Reverse(debtor)));
        }
    }
    // Zero-sum input exhausts both sides together.
    debug_assert!(creditors.is_empty() && debtors.is_empty());

    Ok(payments)
}

/// [`net_positions`] followed by [`settle_balances`]. Pairwise input is
/// zero-sum by construction, so this only fails on arithmetic corruption.
pub fn simplify_debts<Id>(
    pairs: impl IntoIterator<Item = (Id, Id, i64)>,
) -> Result<Vec<Payment<Id>>, SettlementError>
where
    Id: Copy + Ord,
{
    settle_balances(
        net_positions(pairs)
            .into_iter()
            .map(|(id, balance)| PersonBalance { id, balance }),
    )
}
