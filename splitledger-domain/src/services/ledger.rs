//! Append-only expense ledger for a single group.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fxhash::FxHashSet;

use crate::{
    error::InvalidExpenseError,
    model::{
        Expense, ExpenseId, ExpenseKind, Group, MemberBalances, MemberId, Money, PairwiseBalances,
        SplitRule,
    },
    services::split::{apportion, compute_shares},
};

/// A group's roster together with its full expense history.
///
/// Expenses are validated completely before they are appended; a rejected
/// call leaves the ledger untouched. Recorded expenses are never mutated —
/// corrections happen through [`GroupLedger::reverse_expense`].
#[derive(Clone, Debug)]
pub struct GroupLedger {
    group: Group,
    expenses: Vec<Expense>,
    next_expense_id: u64,
}

impl GroupLedger {
    pub fn new(group: Group) -> Self {
        Self {
            group,
            expenses: Vec::new(),
            next_expense_id: 1,
        }
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut Group {
        &mut self.group
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn expense(&self, id: ExpenseId) -> Option<&Expense> {
        self.expenses.iter().find(|expense| expense.id == id)
    }

    /// Validates and appends one expense.
    ///
    /// The payer must be a group member, participants a non-empty subset of
    /// the roster; the split rule is checked by the share calculator. The
    /// participant list is canonicalized to group order with duplicates
    /// dropped before shares are derived.
    pub fn record_expense(
        &mut self,
        description: &str,
        amount: Money,
        payer: MemberId,
        rule: SplitRule,
        participants: &[MemberId],
        timestamp: DateTime<Utc>,
    ) -> Result<ExpenseId, InvalidExpenseError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(InvalidExpenseError::EmptyDescription);
        }
        if !self.group.contains(payer) {
            return Err(InvalidExpenseError::PayerNotInGroup(payer));
        }
        for &participant in participants {
            if !self.group.contains(participant) {
                return Err(InvalidExpenseError::ParticipantNotInGroup(participant));
            }
        }

        let participants = self.canonicalize(participants);
        // Derives and discards the shares; this is the validation gate that
        // makes replay in `fold_into` infallible.
        compute_shares(amount, &rule, &participants)?;

        let id = ExpenseId(self.next_expense_id);
        let expense = Expense {
            id,
            group_id: self.group.id(),
            description: description.to_owned(),
            amount,
            payer,
            rule,
            participants,
            timestamp,
            kind: ExpenseKind::Charge,
        };
        tracing::debug!(
            group = %self.group.id(),
            expense = %id,
            amount = %amount,
            payer = %payer,
            participant_count = expense.participants.len(),
            "Expense recorded"
        );
        self.next_expense_id += 1;
        self.expenses.push(expense);
        Ok(id)
    }

    /// Appends a reversal entry negating a prior charge. The original record
    /// stays in the history; only the fold direction differs.
    pub fn reverse_expense(
        &mut self,
        expense_id: ExpenseId,
        timestamp: DateTime<Utc>,
    ) -> Result<ExpenseId, InvalidExpenseError> {
        let target = self
            .expense(expense_id)
            .ok_or(InvalidExpenseError::UnknownExpense(expense_id))?;
        if target.is_reversal() {
            return Err(InvalidExpenseError::ReversalOfReversal(expense_id));
        }
        if self
            .expenses
            .iter()
            .any(|expense| expense.kind == ExpenseKind::Reversal(expense_id))
        {
            return Err(InvalidExpenseError::AlreadyReversed(expense_id));
        }

        let id = ExpenseId(self.next_expense_id);
        let reversal = Expense {
            id,
            group_id: target.group_id,
            description: target.description.clone(),
            amount: target.amount,
            payer: target.payer,
            rule: target.rule.clone(),
            participants: target.participants.clone(),
            timestamp,
            kind: ExpenseKind::Reversal(expense_id),
        };
        tracing::debug!(
            group = %self.group.id(),
            expense = %id,
            reverses = %expense_id,
            "Expense reversed"
        );
        self.next_expense_id += 1;
        self.expenses.push(reversal);
        Ok(id)
    }

    /// Shares of one recorded expense, keyed by participant.
    pub fn expense_shares(
        &self,
        expense_id: ExpenseId,
    ) -> Result<BTreeMap<MemberId, Money>, InvalidExpenseError> {
        let expense = self
            .expense(expense_id)
            .ok_or(InvalidExpenseError::UnknownExpense(expense_id))?;
        Ok(apportion(
            expense.amount,
            &expense.rule,
            &expense.participants,
        ))
    }

    /// Net balance between every pair of members, derived by replaying the
    /// whole history. Accumulation is commutative, so replay order can never
    /// change the result.
    pub fn pairwise_balances(&self) -> PairwiseBalances {
        let mut balances = PairwiseBalances::new();
        for expense in &self.expenses {
            fold_into(&mut balances, expense);
        }
        balances
    }

    /// One net position per roster member (zero for members without any
    /// expense activity). Always sums to exactly zero.
    pub fn net_positions(&self) -> MemberBalances {
        let mut balances: MemberBalances = self
            .group
            .member_ids()
            .map(|id| (id, Money::ZERO))
            .collect();
        for (member, position) in self.pairwise_balances().net_positions() {
            *balances.entry(member).or_insert(Money::ZERO) += position;
        }
        balances
    }

    /// Total charged to the group, net of reversals.
    pub fn total_spent(&self) -> Money {
        self.expenses
            .iter()
            .map(|expense| match expense.kind {
                ExpenseKind::Charge => expense.amount,
                ExpenseKind::Reversal(_) => -expense.amount,
            })
            .sum()
    }

    /// Group order, duplicates dropped. Membership is checked by the caller.
    fn canonicalize(&self, participants: &[MemberId]) -> Vec<MemberId> {
        let requested: FxHashSet<MemberId> = participants.iter().copied().collect();
        self.group
            .member_ids()
            .filter(|id| requested.contains(id))
            .collect()
    }
}

/// Credits the payer and debits every participant their share. Reversals
/// fold with the opposite direction, exactly undoing the original charge.
fn fold_into(balances: &mut PairwiseBalances, expense: &Expense) {
    let direction = match expense.kind {
        ExpenseKind::Charge => 1,
        ExpenseKind::Reversal(_) => -1,
    };
    let shares = apportion(expense.amount, &expense.rule, &expense.participants);
    for (member, share) in shares {
        if member == expense.payer || share.is_zero() {
            continue;
        }
        let signed = if direction < 0 { -share } else { share };
        balances.record_debt(member, expense.payer, signed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidSplitError;
    use chrono::TimeZone;
    use indexmap::IndexMap;
    use rstest::{fixture, rstest};

    const ALICE: MemberId = MemberId(1);
    const BOB: MemberId = MemberId(2);
    const CHARLIE: MemberId = MemberId(3);

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 19, minute, 0).unwrap()
    }

    #[fixture]
    fn ledger() -> GroupLedger {
        let group = crate::model::Group::try_new(
            crate::model::GroupId(1),
            "Weekend Trip",
            ["Alice", "Bob", "Charlie"],
        )
        .expect("valid group");
        GroupLedger::new(group)
    }

    fn record_equal(
        ledger: &mut GroupLedger,
        amount: i64,
        payer: MemberId,
        participants: &[MemberId],
        minute: u32,
    ) -> ExpenseId {
        ledger
            .record_expense(
                "Dinner",
                Money::from_i64(amount),
                payer,
                SplitRule::Equal,
                participants,
                at(minute),
            )
            .expect("valid expense")
    }

    #[rstest]
    fn equal_expense_produces_expected_pairwise_balances(mut ledger: GroupLedger) {
        record_equal(&mut ledger, 9000, ALICE, &[ALICE, BOB, CHARLIE], 0);

        let shares = ledger
            .expense_shares(ExpenseId(1))
            .expect("shares of recorded expense");
        assert!(shares.values().all(|share| share.amount() == 3000));

        let balances = ledger.pairwise_balances();
        assert_eq!(balances.owed(BOB, ALICE), Money::from_i64(3000));
        assert_eq!(balances.owed(CHARLIE, ALICE), Money::from_i64(3000));
        assert_eq!(balances.owed(CHARLIE, BOB), Money::ZERO);
    }

    #[rstest]
    fn net_positions_sum_to_zero_after_each_append(mut ledger: GroupLedger) {
        record_equal(&mut ledger, 9000, ALICE, &[ALICE, BOB, CHARLIE], 0);
        record_equal(&mut ledger, 3000, BOB, &[ALICE, BOB, CHARLIE], 1);
        record_equal(&mut ledger, 101, CHARLIE, &[ALICE, BOB], 2);

        let net = ledger.net_positions();
        let total: Money = net.values().copied().sum();
        assert!(total.is_zero());
    }

    #[rstest]
    fn second_expense_shifts_net_positions(mut ledger: GroupLedger) {
        record_equal(&mut ledger, 9000, ALICE, &[ALICE, BOB, CHARLIE], 0);
        record_equal(&mut ledger, 3000, BOB, &[ALICE, BOB, CHARLIE], 1);

        let net = ledger.net_positions();
        assert_eq!(net.get(&ALICE), Some(&Money::from_i64(5000)));
        assert_eq!(net.get(&BOB), Some(&Money::from_i64(1000)));
        assert_eq!(net.get(&CHARLIE), Some(&Money::from_i64(-6000)));
    }

    #[rstest]
    fn replay_order_does_not_change_balances(mut ledger: GroupLedger) {
        record_equal(&mut ledger, 9000, ALICE, &[ALICE, BOB, CHARLIE], 0);
        record_equal(&mut ledger, 3000, BOB, &[ALICE, BOB, CHARLIE], 1);
        record_equal(&mut ledger, 700, CHARLIE, &[BOB, CHARLIE], 2);

        let mut shuffled = GroupLedger::new(ledger.group().clone());
        record_equal(&mut shuffled, 700, CHARLIE, &[BOB, CHARLIE], 2);
        record_equal(&mut shuffled, 3000, BOB, &[ALICE, BOB, CHARLIE], 1);
        record_equal(&mut shuffled, 9000, ALICE, &[ALICE, BOB, CHARLIE], 0);

        assert_eq!(ledger.pairwise_balances(), shuffled.pairwise_balances());
    }

    #[rstest]
    fn participants_are_canonicalized_and_deduplicated(mut ledger: GroupLedger) {
        let id = record_equal(&mut ledger, 100, ALICE, &[CHARLIE, BOB, BOB, ALICE], 0);
        let expense = ledger.expense(id).expect("recorded expense");
        assert_eq!(expense.participants(), &[ALICE, BOB, CHARLIE]);
    }

    #[rstest]
    fn rejected_expense_leaves_ledger_unchanged(mut ledger: GroupLedger) {
        record_equal(&mut ledger, 9000, ALICE, &[ALICE, BOB, CHARLIE], 0);
        let before = ledger.pairwise_balances();

        let weights: IndexMap<MemberId, u32> = [(ALICE, 50), (BOB, 40)].into_iter().collect();
        let result = ledger.record_expense(
            "Hotel",
            Money::from_i64(5000),
            ALICE,
            SplitRule::Percentage(weights),
            &[ALICE, BOB],
            at(1),
        );
        assert_eq!(
            result.err(),
            Some(InvalidExpenseError::Split(
                InvalidSplitError::WeightSumMismatch(90)
            )),
        );
        assert_eq!(ledger.expenses().len(), 1);
        assert_eq!(ledger.pairwise_balances(), before);
    }

    #[rstest]
    #[case::unknown_payer(MemberId(9), &[ALICE, BOB], InvalidExpenseError::PayerNotInGroup(MemberId(9)))]
    #[case::unknown_participant(ALICE, &[BOB, MemberId(9)], InvalidExpenseError::ParticipantNotInGroup(MemberId(9)))]
    #[case::no_participants(ALICE, &[], InvalidExpenseError::Split(InvalidSplitError::NoParticipants))]
    fn membership_violations_are_rejected(
        mut ledger: GroupLedger,
        #[case] payer: MemberId,
        #[case] participants: &[MemberId],
        #[case] expected: InvalidExpenseError,
    ) {
        let result = ledger.record_expense(
            "Taxi",
            Money::from_i64(100),
            payer,
            SplitRule::Equal,
            participants,
            at(0),
        );
        assert_eq!(result.err(), Some(expected));
        assert!(ledger.expenses().is_empty());
    }

    #[rstest]
    fn empty_description_is_rejected(mut ledger: GroupLedger) {
        let result = ledger.record_expense(
            "   ",
            Money::from_i64(100),
            ALICE,
            SplitRule::Equal,
            &[ALICE, BOB],
            at(0),
        );
        assert_eq!(result.err(), Some(InvalidExpenseError::EmptyDescription));
    }

    #[rstest]
    fn reversal_restores_prior_balances(mut ledger: GroupLedger) {
        record_equal(&mut ledger, 9000, ALICE, &[ALICE, BOB, CHARLIE], 0);
        let before = ledger.pairwise_balances();
        let reversed = record_equal(&mut ledger, 3000, BOB, &[ALICE, BOB, CHARLIE], 1);

        ledger
            .reverse_expense(reversed, at(2))
            .expect("reversal of a recorded charge");

        assert_eq!(ledger.pairwise_balances(), before);
        assert_eq!(ledger.total_spent(), Money::from_i64(9000));
        assert_eq!(ledger.expenses().len(), 3);
    }

    #[rstest]
    fn double_reversal_is_rejected(mut ledger: GroupLedger) {
        let id = record_equal(&mut ledger, 600, ALICE, &[ALICE, BOB], 0);
        let reversal_id = ledger.reverse_expense(id, at(1)).expect("first reversal");

        assert_eq!(
            ledger.reverse_expense(id, at(2)).err(),
            Some(InvalidExpenseError::AlreadyReversed(id)),
        );
        assert_eq!(
            ledger.reverse_expense(reversal_id, at(2)).err(),
            Some(InvalidExpenseError::ReversalOfReversal(reversal_id)),
        );
        assert_eq!(
            ledger.reverse_expense(ExpenseId(99), at(2)).err(),
            Some(InvalidExpenseError::UnknownExpense(ExpenseId(99))),
        );
    }

    #[rstest]
    fn percentage_expense_folds_by_weight(mut ledger: GroupLedger) {
        let weights: IndexMap<MemberId, u32> =
            [(ALICE, 70), (BOB, 30)].into_iter().collect();
        ledger
            .record_expense(
                "Rent",
                Money::from_i64(200_000),
                BOB,
                SplitRule::Percentage(weights),
                &[ALICE, BOB],
                at(0),
            )
            .expect("valid percentage expense");

        let balances = ledger.pairwise_balances();
        assert_eq!(balances.owed(ALICE, BOB), Money::from_i64(140_000));
    }
}
