pub mod extract;
pub mod intent_parser;

pub use extract::{canonicalize_address, detect_account_address, extract_amount_and_token, AddressError};
pub use intent_parser::parse_intent;
