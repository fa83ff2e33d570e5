use smol_str::SmolStr;
use splitledger_domain::{ExpenseId, GroupId, InvalidExpenseError, InvalidGroupError};
use splitledger_settlement::SettlementError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("group <{0}> does not exist")]
    Group(GroupId),
    #[error("expense <{0}> does not exist")]
    Expense(ExpenseId),
    #[error("no group has a member named {0:?}")]
    Member(SmolStr),
}

/// Every failure the service surfaces is a caller-correctable input error;
/// there is no fatal class inside the core.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    InvalidGroup(#[from] InvalidGroupError),
    #[error(transparent)]
    InvalidExpense(#[from] InvalidExpenseError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
}
