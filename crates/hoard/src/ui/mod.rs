pub mod prompt;
pub mod tracker;

pub use tracker::TransferTracker;
