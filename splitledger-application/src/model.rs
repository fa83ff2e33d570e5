use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use splitledger_domain::{ExpenseId, ExpenseKind, GroupId, Money};

/// Net balance against one other person, aggregated across every shared
/// group. Positive: they owe the user; negative: the user owes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterpartyBalance {
    pub name: SmolStr,
    pub amount: Money,
}

/// Cross-group position of one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserOverview {
    pub user: SmolStr,
    /// Total others owe the user.
    pub total_owed: Money,
    /// Total the user owes others.
    pub total_owes: Money,
    /// `total_owed - total_owes`.
    pub net_balance: Money,
    /// Sorted by amount descending (largest credit first, largest debt
    /// last), name on ties.
    pub counterparties: Vec<CounterpartyBalance>,
}

/// Card-level group facts for the group list view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSummary {
    pub id: GroupId,
    pub name: SmolStr,
    pub member_names: Vec<SmolStr>,
    pub total_spent: Money,
}

impl GroupSummary {
    pub fn member_count(&self) -> usize {
        self.member_names.len()
    }
}

/// One entry of the cross-group expense feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseRecord {
    pub group_id: GroupId,
    pub group_name: SmolStr,
    pub expense_id: ExpenseId,
    pub description: String,
    pub amount: Money,
    pub payer_name: SmolStr,
    pub participant_count: usize,
    pub timestamp: DateTime<Utc>,
    pub kind: ExpenseKind,
}
