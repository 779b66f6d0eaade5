mod context;
mod key;
mod planner;
mod record;

pub use context::*;
pub use key::*;
pub use planner::*;
pub use record::*;
