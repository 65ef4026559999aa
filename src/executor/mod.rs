pub mod row;
pub use row::*;

pub mod merge_barrier;
pub use merge_barrier::*;

pub mod top_n;
pub use top_n::*;
