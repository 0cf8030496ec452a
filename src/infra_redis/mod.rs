mod rate_limit_store_redis;

pub use rate_limit_store_redis::*;
