mod account;
mod rate_limit;
mod token;

pub use account::*;
pub use rate_limit::*;
pub use token::*;
