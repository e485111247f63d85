use crate::models::token::is_stablecoin;

/// Shorten any base58 string to `abcd...wxyz`
pub fn shorten_address(address: &str) -> String {
    let len = address.len();
    if len <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[0..4], &address[len - 4..len])
}

fn trim_decimal(mut text: String) -> String {
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    text
}

/// Format a token amount with precision suited to the token.
///
/// Stablecoins print with 2 decimals unless that would show a non-zero amount
/// as `0.00`, in which case up to 8 decimals are used.
pub fn format_token_amount(amount: f64, symbol: &str) -> String {
    if is_stablecoin(symbol) {
        let two = format!("{:.2}", amount);
        if amount != 0.0 && (two == "0.00" || two == "-0.00") {
            return trim_decimal(format!("{:.8}", amount));
        }
        return two;
    }
    trim_decimal(format!("{:.6}", amount))
}

/// Format a USD value; unknown valuations are shown distinctly from zero
pub fn format_usd(value: Option<f64>) -> String {
    match value {
        Some(v) if v.abs() >= 0.01 || v == 0.0 => format!("${:.2}", v),
        Some(v) => format!("${}", trim_decimal(format!("{:.8}", v))),
        None => "n/a".to_string(),
    }
}

/// Large dollar figures such as market caps
pub fn format_compact_usd(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("${:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("${:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("${:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("${:.2}K", value / 1e3)
    } else {
        format!("${:.2}", value)
    }
}

pub fn format_percent_change(change: f64) -> String {
    format!("{}{:.2}%", if change >= 0.0 { "+" } else { "" }, change)
}

/// Link to a transaction on the configured explorer
pub fn explorer_url(base_url: &str, signature: &str) -> String {
    format!("{}/tx/{}", base_url.trim_end_matches('/'), signature)
}
