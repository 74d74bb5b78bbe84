mod rate;
mod transaction;
mod users;

pub use rate::*;
pub use transaction::*;
pub use users::*;
