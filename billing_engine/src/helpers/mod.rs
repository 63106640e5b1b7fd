mod order_signature;

pub use order_signature::{constant_time_eq, order_signature, verify_order_signature, SIGNATURE_PARAM};
