pub mod ledger;
pub mod split;

pub use ledger::GroupLedger;
pub use split::compute_shares;
