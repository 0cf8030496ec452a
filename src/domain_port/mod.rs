// store

mod account_store;
mod rate_limit_store;

pub use account_store::*;
pub use rate_limit_store::*;

// time

mod clock;

pub use clock::*;
