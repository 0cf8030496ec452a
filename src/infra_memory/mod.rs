mod account_store_memory;
mod rate_limit_store_memory;

pub use account_store_memory::*;
pub use rate_limit_store_memory::*;
