//! The operation surface the presentation layer talks to.

use std::{cmp::Reverse, collections::BTreeMap, sync::atomic::{AtomicU64, Ordering}};

use dashmap::DashMap;
use smol_str::SmolStr;
use splitledger_domain::{
    ExpenseId, Group, GroupId, GroupLedger, Member, MemberBalances, MemberId, Money,
    PairwiseBalances, SplitRule, Transfer,
};
use splitledger_settlement::simplify_debts;

use crate::{
    error::{NotFoundError, ServiceError},
    model::{CounterpartyBalance, ExpenseRecord, GroupSummary, UserOverview},
    ports::{Clock, SystemClock},
};

/// Registry of group ledgers plus the read-only query facade.
///
/// Writes to one group are linearized by the map entry's exclusive guard, so
/// the zero-sum invariant can never be observed torn; writes to different
/// groups proceed independently. Reads take the shared guard and see a
/// consistent, read-after-write snapshot of that group.
pub struct ExpenseService<C = SystemClock> {
    ledgers: DashMap<GroupId, GroupLedger>,
    next_group_id: AtomicU64,
    clock: C,
}

impl ExpenseService<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for ExpenseService<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ExpenseService<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            ledgers: DashMap::new(),
            next_group_id: AtomicU64::new(1),
            clock,
        }
    }

    pub fn create_group<I, S>(&self, name: &str, member_names: I) -> Result<GroupId, ServiceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let id = GroupId(self.next_group_id.fetch_add(1, Ordering::Relaxed));
        let group = Group::try_new(id, name, member_names)?;
        tracing::info!(group = %id, name = group.name(), members = group.members().len(), "Group created");
        self.ledgers.insert(id, GroupLedger::new(group));
        Ok(id)
    }

    /// Resolves a member's id within one group by display name.
    pub fn member_id(&self, group_id: GroupId, name: &str) -> Result<MemberId, ServiceError> {
        let ledger = self.ledger(group_id)?;
        ledger
            .group()
            .member_named(name)
            .map(Member::id)
            .ok_or_else(|| NotFoundError::Member(SmolStr::new(name)).into())
    }

    /// Adds a member to an existing group; the roster only ever grows.
    pub fn add_group_member(&self, group_id: GroupId, name: &str) -> Result<MemberId, ServiceError> {
        let mut ledger = self
            .ledgers
            .get_mut(&group_id)
            .ok_or(NotFoundError::Group(group_id))?;
        Ok(ledger.group_mut().add_member(name)?)
    }

    pub fn add_expense(
        &self,
        group_id: GroupId,
        description: &str,
        amount: Money,
        payer: MemberId,
        rule: SplitRule,
        participants: &[MemberId],
    ) -> Result<ExpenseId, ServiceError> {
        let timestamp = self.clock.now();
        let mut ledger = self
            .ledgers
            .get_mut(&group_id)
            .ok_or(NotFoundError::Group(group_id))?;
        Ok(ledger.record_expense(description, amount, payer, rule, participants, timestamp)?)
    }

    pub fn reverse_expense(
        &self,
        group_id: GroupId,
        expense_id: ExpenseId,
    ) -> Result<ExpenseId, ServiceError> {
        let timestamp = self.clock.now();
        let mut ledger = self
            .ledgers
            .get_mut(&group_id)
            .ok_or(NotFoundError::Group(group_id))?;
        Ok(ledger.reverse_expense(expense_id, timestamp)?)
    }

    /// The direct who-owes-whom view of one group.
    pub fn group_pairwise(&self, group_id: GroupId) -> Result<PairwiseBalances, ServiceError> {
        Ok(self.ledger(group_id)?.pairwise_balances())
    }

    pub fn group_net_positions(&self, group_id: GroupId) -> Result<MemberBalances, ServiceError> {
        Ok(self.ledger(group_id)?.net_positions())
    }

    /// The simplified settlement plan for one group: the greedy minimal
    /// payment list that zeroes every member's position. Empty means the
    /// group is fully settled.
    pub fn group_settlement(&self, group_id: GroupId) -> Result<Vec<Transfer>, ServiceError> {
        let pairwise = self.ledger(group_id)?.pairwise_balances();
        let payments = simplify_debts(
            pairwise
                .debts()
                .map(|(debtor, creditor, amount)| (debtor, creditor, amount.amount())),
        )?;
        Ok(payments
            .into_iter()
            .map(|payment| Transfer {
                from: payment.from,
                to: payment.to,
                amount: Money::from_i64(payment.amount),
            })
            .collect())
    }

    /// Cross-group position of the named user: what they are owed, what they
    /// owe, and the per-counterparty breakdown. Members are group-scoped, so
    /// identity across groups is by display name.
    pub fn user_overview(&self, user: &str) -> Result<UserOverview, ServiceError> {
        let mut member_of_any_group = false;
        let mut by_counterparty: BTreeMap<SmolStr, i64> = BTreeMap::new();

        for entry in self.ledgers.iter() {
            let ledger = entry.value();
            let Some(user_id) = ledger.group().member_named(user).map(Member::id) else {
                continue;
            };
            member_of_any_group = true;

            for (debtor, creditor, amount) in ledger.pairwise_balances().debts() {
                let (counterparty, signed) = if creditor == user_id {
                    (debtor, amount.amount())
                } else if debtor == user_id {
                    (creditor, -amount.amount())
                } else {
                    continue;
                };
                let name = ledger
                    .group()
                    .member(counterparty)
                    .map(|member| SmolStr::new(member.name()))
                    .unwrap_or_default();
                *by_counterparty.entry(name).or_insert(0) += signed;
            }
        }

        if !member_of_any_group {
            return Err(NotFoundError::Member(SmolStr::new(user)).into());
        }

        let mut counterparties: Vec<CounterpartyBalance> = by_counterparty
            .into_iter()
            .filter(|&(_, amount)| amount != 0)
            .map(|(name, amount)| CounterpartyBalance {
                name,
                amount: Money::from_i64(amount),
            })
            .collect();
        counterparties.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.name.cmp(&b.name))
        });

        let total_owed: Money = counterparties
            .iter()
            .filter(|balance| balance.amount.is_positive())
            .map(|balance| balance.amount)
            .sum();
        let total_owes: Money = counterparties
            .iter()
            .filter(|balance| !balance.amount.is_positive())
            .map(|balance| -balance.amount)
            .sum();

        Ok(UserOverview {
            user: SmolStr::new(user),
            total_owed,
            total_owes,
            net_balance: total_owed - total_owes,
            counterparties,
        })
    }

    /// Card-level facts for every group, ordered by group id.
    pub fn group_summaries(&self) -> Vec<GroupSummary> {
        let mut summaries: Vec<GroupSummary> = self
            .ledgers
            .iter()
            .map(|entry| {
                let ledger = entry.value();
                GroupSummary {
                    id: ledger.group().id(),
                    name: SmolStr::new(ledger.group().name()),
                    member_names: ledger
                        .group()
                        .members()
                        .iter()
                        .map(|member| SmolStr::new(member.name()))
                        .collect(),
                    total_spent: ledger.total_spent(),
                }
            })
            .collect();
        summaries.sort_by_key(|summary| summary.id);
        summaries
    }

    /// The cross-group expense feed, newest first.
    pub fn recent_expenses(&self, limit: Option<usize>) -> Vec<ExpenseRecord> {
        let mut records: Vec<ExpenseRecord> = self
            .ledgers
            .iter()
            .flat_map(|entry| {
                let ledger = entry.value();
                let group_name = SmolStr::new(ledger.group().name());
                ledger
                    .expenses()
                    .iter()
                    .map(|expense| ExpenseRecord {
                        group_id: expense.group_id(),
                        group_name: group_name.clone(),
                        expense_id: expense.id(),
                        description: expense.description().to_owned(),
                        amount: expense.amount(),
                        payer_name: ledger
                            .group()
                            .member(expense.payer())
                            .map(|member| SmolStr::new(member.name()))
                            .unwrap_or_default(),
                        participant_count: expense.participants().len(),
                        timestamp: expense.timestamp(),
                        kind: expense.kind(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        records.sort_by_key(|record| {
            (
                Reverse(record.timestamp),
                record.group_id,
                Reverse(record.expense_id),
            )
        });
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }

    fn ledger(
        &self,
        group_id: GroupId,
    ) -> Result<dashmap::mapref::one::Ref<'_, GroupId, GroupLedger>, ServiceError> {
        self.ledgers
            .get(&group_id)
            .ok_or_else(|| NotFoundError::Group(group_id).into())
    }
}
