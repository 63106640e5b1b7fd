mod amount;
mod helpers;

pub mod op;
mod secret;

pub use amount::{Amount, AmountConversionError};
pub use helpers::{is_currency_code, parse_boolean_flag};
pub use secret::Secret;
