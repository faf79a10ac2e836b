pub mod cooldown;
pub mod detector;
pub mod history;
pub mod ledger;
pub mod session;
pub mod tracker;
