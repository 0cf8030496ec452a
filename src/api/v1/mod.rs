mod cookie;
mod error;
mod filter;
mod handler;
mod router;

pub use error::recover_error;
pub use router::routes;
