use std::{
    collections::BTreeMap,
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use chrono::{DateTime, Utc};
use fxhash::FxHashSet;
use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::InvalidGroupError;

/// Signed amount in minor currency units (paise, cents). All balance math is
/// integer arithmetic; there is no floating point anywhere in the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub fn from_i64(value: i64) -> Self {
        Self(value)
    }

    pub fn amount(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn signum(self) -> i64 {
        self.0.signum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.map(|money| money.0).sum())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpenseId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    id: MemberId,
    name: SmolStr,
}

impl Member {
    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A roster of members splitting expenses together.
///
/// Member order is insertion order and doubles as the canonical order for
/// remainder distribution, so a group's split results are reproducible.
/// Members can be added but never removed.
#[derive(Clone, Debug)]
pub struct Group {
    id: GroupId,
    name: SmolStr,
    members: Vec<Member>,
}

impl Group {
    pub fn try_new<I, S>(id: GroupId, name: &str, member_names: I) -> Result<Self, InvalidGroupError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(InvalidGroupError::EmptyName);
        }

        let mut group = Self {
            id,
            name: SmolStr::new(name),
            members: Vec::new(),
        };
        let mut seen: FxHashSet<SmolStr> = FxHashSet::default();
        for member_name in member_names {
            let member_name = member_name.as_ref().trim();
            if member_name.is_empty() {
                return Err(InvalidGroupError::EmptyMemberName);
            }
            let member_name = SmolStr::new(member_name);
            if !seen.insert(member_name.clone()) {
                return Err(InvalidGroupError::DuplicateMemberName(member_name));
            }
            group.push_member(member_name);
        }

        if group.members.len() < 2 {
            return Err(InvalidGroupError::TooFewMembers(group.members.len()));
        }

        Ok(group)
    }

    /// Adds a member to the roster. The member set may only grow; new members
    /// simply carry a zero balance against everyone else.
    pub fn add_member(&mut self, name: &str) -> Result<MemberId, InvalidGroupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InvalidGroupError::EmptyMemberName);
        }
        if self.members.iter().any(|member| member.name == name) {
            return Err(InvalidGroupError::DuplicateMemberName(SmolStr::new(name)));
        }
        Ok(self.push_member(SmolStr::new(name)))
    }

    fn push_member(&mut self, name: SmolStr) -> MemberId {
        let id = MemberId(self.members.len() as u64 + 1);
        self.members.push(Member { id, name });
        id
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    pub fn member_named(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.name == name)
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.member(id).is_some()
    }

    pub fn member_ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.members.iter().map(Member::id)
    }

    /// Position of a member in the canonical (insertion) order.
    pub fn position(&self, id: MemberId) -> Option<usize> {
        self.members.iter().position(|member| member.id == id)
    }
}

/// How an expense amount is divided among its participants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitRule {
    /// Every participant owes an equal share; indivisible remainders go one
    /// minor unit at a time to the earliest participants in canonical order.
    Equal,
    /// Each participant owes `floor(amount * weight / 100)`; weights are
    /// integer percents and must sum to exactly 100. Remainders go to the
    /// participants with the largest fractional loss first.
    Percentage(IndexMap<MemberId, u32>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpenseKind {
    Charge,
    /// Negates a prior expense. Corrections are modeled as a reversal plus a
    /// fresh charge, never as mutation of the original record.
    Reversal(ExpenseId),
}

/// An immutable ledger entry. Participants are stored in canonical group
/// order with duplicates removed, so share computation is deterministic.
#[derive(Clone, Debug)]
pub struct Expense {
    pub(crate) id: ExpenseId,
    pub(crate) group_id: GroupId,
    pub(crate) description: String,
    pub(crate) amount: Money,
    pub(crate) payer: MemberId,
    pub(crate) rule: SplitRule,
    pub(crate) participants: Vec<MemberId>,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) kind: ExpenseKind,
}

impl Expense {
    pub fn id(&self) -> ExpenseId {
        self.id
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn payer(&self) -> MemberId {
        self.payer
    }

    pub fn rule(&self) -> &SplitRule {
        &self.rule
    }

    pub fn participants(&self) -> &[MemberId] {
        &self.participants
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> ExpenseKind {
        self.kind
    }

    pub fn is_reversal(&self) -> bool {
        matches!(self.kind, ExpenseKind::Reversal(_))
    }
}

/// Net position per member. A `BTreeMap` so iteration order is stable.
pub type MemberBalances = BTreeMap<MemberId, Money>;

/// A single proposed payment settling part of a group's debt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Money,
}

/// Net balances between every pair of members of one group.
///
/// Pairs are keyed `(low, high)` by member id; a positive value means the
/// higher-id member owes the lower-id member, a negative value the opposite.
/// Accumulation is plain signed addition, so folding the same expenses in any
/// order produces the same table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PairwiseBalances(BTreeMap<(MemberId, MemberId), Money>);

impl PairwiseBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `debtor` owes `creditor` an additional `amount`. Negative
    /// amounts record a repayment in the opposite direction.
    pub fn record_debt(&mut self, debtor: MemberId, creditor: MemberId, amount: Money) {
        debug_assert_ne!(debtor, creditor);
        let (key, signed) = if creditor < debtor {
            ((creditor, debtor), amount)
        } else {
            ((debtor, creditor), -amount)
        };
        *self.0.entry(key).or_insert(Money::ZERO) += signed;
    }

    /// Net amount `debtor` currently owes `creditor`; negative when the debt
    /// runs the other way.
    pub fn owed(&self, debtor: MemberId, creditor: MemberId) -> Money {
        let (key, sign) = if creditor < debtor {
            ((creditor, debtor), 1)
        } else {
            ((debtor, creditor), -1)
        };
        let balance = self.0.get(&key).copied().unwrap_or(Money::ZERO);
        if sign < 0 {
            -balance
        } else {
            balance
        }
    }

    /// Non-zero debts as `(debtor, creditor, amount)` with `amount` always
    /// positive, in stable pair order.
    pub fn debts(&self) -> impl Iterator<Item = (MemberId, MemberId, Money)> + '_ {
        self.0.iter().filter_map(|(&(low, high), &balance)| {
            if balance.is_positive() {
                Some((high, low, balance))
            } else if !balance.is_zero() {
                Some((low, high, -balance))
            } else {
                None
            }
        })
    }

    /// Collapses the pair table into one net position per member mentioned.
    pub fn net_positions(&self) -> MemberBalances {
        let mut balances = MemberBalances::new();
        for (debtor, creditor, amount) in self.debts() {
            *balances.entry(creditor).or_insert(Money::ZERO) += amount;
            *balances.entry(debtor).or_insert(Money::ZERO) -= amount;
        }
        balances
    }

    pub fn is_settled(&self) -> bool {
        self.0.values().all(|balance| balance.is_zero())
    }
}

impl FromIterator<((MemberId, MemberId), Money)> for PairwiseBalances {
    fn from_iter<I: IntoIterator<Item = ((MemberId, MemberId), Money)>>(iter: I) -> Self {
        let mut balances = Self::new();
        for ((debtor, creditor), amount) in iter {
            balances.record_debt(debtor, creditor, amount);
        }
        balances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_requires_two_distinct_members() {
        assert_eq!(
            Group::try_new(GroupId(1), "Trip", ["Alice"]).err(),
            Some(InvalidGroupError::TooFewMembers(1)),
        );
        assert_eq!(
            Group::try_new(GroupId(1), "Trip", ["Alice", "Alice"]).err(),
            Some(InvalidGroupError::DuplicateMemberName(SmolStr::new("Alice"))),
        );
        assert_eq!(
            Group::try_new(GroupId(1), "  ", ["Alice", "Bob"]).err(),
            Some(InvalidGroupError::EmptyName),
        );
        assert_eq!(
            Group::try_new(GroupId(1), "Trip", ["Alice", " "]).err(),
            Some(InvalidGroupError::EmptyMemberName),
        );
    }

    #[test]
    fn members_keep_insertion_order() {
        let group =
            Group::try_new(GroupId(1), "Trip", ["Alice", "Bob", "Charlie"]).expect("valid group");
        let names: Vec<&str> = group.members().iter().map(Member::name).collect();
        assert_eq!(names, ["Alice", "Bob", "Charlie"]);
        assert_eq!(group.member_named("Bob").map(Member::id), Some(MemberId(2)));
        assert_eq!(group.position(MemberId(3)), Some(2));
    }

    #[test]
    fn add_member_rejects_duplicates_and_grows_roster() {
        let mut group = Group::try_new(GroupId(1), "Flat", ["Alice", "Bob"]).expect("valid group");
        assert_eq!(
            group.add_member("Alice"),
            Err(InvalidGroupError::DuplicateMemberName(SmolStr::new("Alice"))),
        );
        let id = group.add_member("Charlie").expect("new member");
        assert_eq!(id, MemberId(3));
        assert_eq!(group.members().len(), 3);
    }

    #[test]
    fn pairwise_accumulation_is_signed_and_symmetric() {
        let mut balances = PairwiseBalances::new();
        balances.record_debt(MemberId(2), MemberId(1), Money::from_i64(3000));
        balances.record_debt(MemberId(1), MemberId(2), Money::from_i64(1000));

        assert_eq!(
            balances.owed(MemberId(2), MemberId(1)),
            Money::from_i64(2000)
        );
        assert_eq!(
            balances.owed(MemberId(1), MemberId(2)),
            Money::from_i64(-2000)
        );

        let debts: Vec<_> = balances.debts().collect();
        assert_eq!(
            debts,
            vec![(MemberId(2), MemberId(1), Money::from_i64(2000))]
        );
    }

    #[test]
    fn net_positions_sum_to_zero() {
        let mut balances = PairwiseBalances::new();
        balances.record_debt(MemberId(2), MemberId(1), Money::from_i64(3000));
        balances.record_debt(MemberId(3), MemberId(1), Money::from_i64(2000));
        balances.record_debt(MemberId(3), MemberId(2), Money::from_i64(500));

        let net = balances.net_positions();
        let total: Money = net.values().copied().sum();
        assert!(total.is_zero());
        assert_eq!(net.get(&MemberId(1)), Some(&Money::from_i64(5000)));
        assert_eq!(net.get(&MemberId(2)), Some(&Money::from_i64(-2500)));
        assert_eq!(net.get(&MemberId(3)), Some(&Money::from_i64(-2500)));
    }
}
