mod amount;

pub mod helpers;
pub mod op;
mod secret;

pub use amount::{Amount, DEFAULT_CURRENCY_CODE, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
