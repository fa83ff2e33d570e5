#![warn(clippy::uninlined_format_args)]

pub mod error;
pub mod model;
pub mod services;

pub use error::{InvalidExpenseError, InvalidGroupError, InvalidSplitError};
pub use model::{
    Expense, ExpenseId, ExpenseKind, Group, GroupId, Member, MemberBalances, MemberId, Money,
    PairwiseBalances, SplitRule, Transfer,
};
pub use services::{compute_shares, GroupLedger};
