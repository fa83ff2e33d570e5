use smol_str::SmolStr;
use thiserror::Error;

use crate::model::{ExpenseId, MemberId, Money};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidGroupError {
    #[error("group name must not be empty")]
    EmptyName,
    #[error("a group needs at least 2 members (got {0})")]
    TooFewMembers(usize),
    #[error("member name must not be empty")]
    EmptyMemberName,
    #[error("duplicate member name {0:?}")]
    DuplicateMemberName(SmolStr),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSplitError {
    #[error("expense amount must be positive (got {0})")]
    NonPositiveAmount(Money),
    #[error("an expense needs at least one participant")]
    NoParticipants,
    #[error("participant <{0}> appears more than once")]
    DuplicateParticipant(MemberId),
    #[error("percentage weights must cover exactly the participant set")]
    WeightSetMismatch,
    #[error("percentage weights must sum to 100 (got {0})")]
    WeightSumMismatch(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidExpenseError {
    #[error("expense description must not be empty")]
    EmptyDescription,
    #[error("payer <{0}> is not a member of the group")]
    PayerNotInGroup(MemberId),
    #[error("participant <{0}> is not a member of the group")]
    ParticipantNotInGroup(MemberId),
    #[error("expense <{0}> does not exist in this group")]
    UnknownExpense(ExpenseId),
    #[error("expense <{0}> has already been reversed")]
    AlreadyReversed(ExpenseId),
    #[error("expense <{0}> is itself a reversal and cannot be reversed")]
    ReversalOfReversal(ExpenseId),
    #[error(transparent)]
    Split(#[from] InvalidSplitError),
}
