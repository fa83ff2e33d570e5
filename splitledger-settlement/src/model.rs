/// Net position of one member (positive: is owed, negative: owes).
/// The unit is an integer minor currency amount (e.g. paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonBalance<Id = u64> {
    pub id: Id,
    pub balance: i64,
}

/// One settling payment from a debtor to a creditor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payment<Id = u64> {
    pub from: Id,
    pub to: Id,
    pub amount: i64,
}
