mod convert;
mod format;

pub use convert::lamports_to_sol;
pub use convert::sol_to_lamports;
pub use convert::{from_base_units, to_base_units};
pub use format::{
    explorer_url, format_compact_usd, format_percent_change, format_token_amount, format_usd,
    shorten_address,
};
