pub mod address;
pub mod amount;
pub mod audit;
pub mod balance;
pub mod bytes;
pub mod coin;
pub mod config;
pub mod custody;
pub mod ingest;
pub mod ledger;
pub mod node;
pub mod report;
