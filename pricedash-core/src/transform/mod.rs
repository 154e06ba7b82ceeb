//! Pure transforms over canonical records: matrix building, returns, rebasing.

pub mod matrix;
pub mod returns;

pub use matrix::to_matrix;
pub use returns::{cumulative_returns, daily_returns, rebase_to_100};
