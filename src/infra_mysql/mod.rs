mod account_store_mysql;

pub use account_store_mysql::*;

mod util;
