//! Free-text to [`Intent`] classification.
//!
//! Rules are evaluated top to bottom and the first one that produces an intent
//! wins, so the order of [`RULES`] is part of the behaviour.

use log::debug;
use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::models::Intent;
use crate::parsing::extract::{canonicalize_address, detect_account_address};

struct Patterns {
    greeting: Regex,
    help: Regex,
    history: Regex,
    balance: Regex,
    meme: Regex,
    price: Regex,
    price_subject: Regex,
    subject_price: Regex,
    market: Regex,
    send: Regex,
    swap: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("intent pattern compiles")
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        greeting: compile(r"(?i)^\s*(hi|hello|hey|hiya|yo|gm|good (morning|afternoon|evening))\b[\s!.,]*$"),
        help: compile(r"(?i)\b(help|what can you do|commands|how do i|how does this work|what do you do)\b"),
        history: compile(r"(?i)\b(history|recent transactions|my transactions|transaction list|activity|past transactions)\b"),
        balance: compile(r"(?i)\b(balance|balances|portfolio|holdings|my tokens|my wallet|how much (sol )?do i have)\b"),
        meme: compile(r"(?i)\b(analy[sz]e|analysis|meme|memecoin|check token|rug|research|token info)\b"),
        price: compile(r"(?i)\b(price|prices|worth|how much is|value of|market|trending|top coins)\b"),
        price_subject: compile(r"(?i)\b(?:price of|price for|how much is|value of|worth of)\s+\$?([a-z][a-z0-9]{1,9})\b"),
        subject_price: compile(r"(?i)\$?\b([a-z][a-z0-9]{1,9})\s+(?:price|worth)\b"),
        market: compile(r"(?i)\b(market|trending|top coins|overview)\b"),
        send: compile(r"(?i)\b(?:send|transfer)\s+(\d+(?:\.\d+)?|\.\d+)\s*([a-z][a-z0-9]*)\s+to\s+(\S+)"),
        swap: compile(
            r"(?i)\b(?:swap|convert|exchange)\s+(\d+(?:\.\d+)?|\.\d+)\s*([a-z][a-z0-9]*)\s+(?:to|for|into)\s+([a-z][a-z0-9]*)\b",
        ),
    })
}

type Rule = (&'static str, fn(&Patterns, &str) -> Option<Intent>);

/// Classification rules in priority order
const RULES: &[Rule] = &[
    ("greeting", greeting),
    ("help", help),
    ("history", history),
    ("balance", balance),
    ("meme", meme),
    ("price", price),
    ("send", send),
    ("swap", swap),
];

const PRICE_STOPWORDS: &[&str] = &["the", "a", "my", "current", "token", "coin", "what", "is", "whats", "s"];

fn greeting(p: &Patterns, text: &str) -> Option<Intent> {
    p.greeting.is_match(text).then_some(Intent::Greeting)
}

fn help(p: &Patterns, text: &str) -> Option<Intent> {
    p.help.is_match(text).then_some(Intent::Help)
}

fn history(p: &Patterns, text: &str) -> Option<Intent> {
    p.history.is_match(text).then_some(Intent::History)
}

fn balance(p: &Patterns, text: &str) -> Option<Intent> {
    p.balance.is_match(text).then_some(Intent::Balance)
}

fn meme(p: &Patterns, text: &str) -> Option<Intent> {
    if !p.meme.is_match(text) {
        return None;
    }
    detect_account_address(text).map(|address| Intent::Meme { address })
}

fn price_symbol(captures: Option<Captures<'_>>) -> Option<String> {
    let symbol = captures?.get(1)?.as_str().to_lowercase();
    (!PRICE_STOPWORDS.contains(&symbol.as_str())).then(|| symbol.to_uppercase())
}

fn price(p: &Patterns, text: &str) -> Option<Intent> {
    if !p.price.is_match(text) {
        return None;
    }
    // Prices by mint come from the token lookup, not the ticker feed.
    if let Some(address) = detect_account_address(text) {
        return Some(Intent::Meme { address });
    }
    let symbol = price_symbol(p.price_subject.captures(text)).or_else(|| price_symbol(p.subject_price.captures(text)));
    match symbol {
        Some(symbol) => Some(Intent::Price { symbol: Some(symbol) }),
        None if p.market.is_match(text) => Some(Intent::Price { symbol: None }),
        None => Some(Intent::Price { symbol: Some("SOL".to_string()) }),
    }
}

/// Accepts any ticker so an unknown one reaches the transfer service and is
/// reported as unsupported. [`extract_amount_and_token`] is the allow-listed
/// variant.
///
/// [`extract_amount_and_token`]: crate::parsing::extract_amount_and_token
fn send(p: &Patterns, text: &str) -> Option<Intent> {
    let captures = p.send.captures(text)?;
    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    let token = captures.get(2)?.as_str().to_uppercase();
    let raw_recipient = captures
        .get(3)?
        .as_str()
        .trim_matches(|c: char| !c.is_ascii_alphanumeric());
    // Keep an invalid recipient as typed so the transfer service can report it.
    let recipient = canonicalize_address(raw_recipient).unwrap_or_else(|_| raw_recipient.to_string());
    Some(Intent::Send { recipient, amount, token })
}

fn swap(p: &Patterns, text: &str) -> Option<Intent> {
    let captures = p.swap.captures(text)?;
    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some(Intent::Swap {
        from_token: captures.get(2)?.as_str().to_uppercase(),
        to_token: captures.get(3)?.as_str().to_uppercase(),
        amount,
    })
}

/// Classify one user message. `None` means no rule matched.
pub fn parse_intent(text: &str) -> Option<Intent> {
    let p = patterns();
    RULES.iter().find_map(|(name, rule)| {
        let intent = rule(p, text)?;
        debug!("Message classified by '{}' rule", name);
        Some(intent)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

    #[test]
    fn parses_send_command() {
        let intent = parse_intent(&format!("send 0.1 SOL to {ADDRESS}"));
        assert_eq!(
            intent,
            Some(Intent::Send { recipient: ADDRESS.to_string(), amount: 0.1, token: "SOL".to_string() })
        );
    }

    #[test]
    fn send_keeps_invalid_recipient_verbatim() {
        let intent = parse_intent("transfer 2 sol to bob!");
        assert_eq!(
            intent,
            Some(Intent::Send { recipient: "bob".to_string(), amount: 2.0, token: "SOL".to_string() })
        );
    }

    #[test]
    fn send_passes_unknown_tickers_through() {
        let text = format!("send 5 DOGE to {ADDRESS}");
        assert_eq!(
            parse_intent(&text),
            Some(Intent::Send { recipient: ADDRESS.to_string(), amount: 5.0, token: "DOGE".to_string() })
        );
        assert_eq!(crate::parsing::extract_amount_and_token(&text), None);
    }

    #[test]
    fn parses_swap_command() {
        assert_eq!(
            parse_intent("swap 1 SOL to USDC"),
            Some(Intent::Swap { from_token: "SOL".to_string(), to_token: "USDC".to_string(), amount: 1.0 })
        );
        assert_eq!(
            parse_intent("please convert 250 usdc into bonk"),
            Some(Intent::Swap { from_token: "USDC".to_string(), to_token: "BONK".to_string(), amount: 250.0 })
        );
    }

    #[test]
    fn parses_price_queries() {
        assert_eq!(parse_intent("what's the price of BTC"), Some(Intent::Price { symbol: Some("BTC".to_string()) }));
        assert_eq!(parse_intent("eth price?"), Some(Intent::Price { symbol: Some("ETH".to_string()) }));
        assert_eq!(parse_intent("show me the market"), Some(Intent::Price { symbol: None }));
    }

    #[test]
    fn price_of_an_address_is_a_token_lookup() {
        let expected = Some(Intent::Meme { address: ADDRESS.to_string() });
        assert_eq!(parse_intent(&format!("price of {ADDRESS}")), expected);
        assert_eq!(parse_intent(&format!("how much is {ADDRESS} worth?")), expected);
        assert_eq!(parse_intent("what's the price?"), Some(Intent::Price { symbol: Some("SOL".to_string()) }));
    }

    #[test]
    fn simple_intents() {
        assert_eq!(parse_intent("hello!"), Some(Intent::Greeting));
        assert_eq!(parse_intent("what can you do?"), Some(Intent::Help));
        assert_eq!(parse_intent("show my balance"), Some(Intent::Balance));
        assert_eq!(parse_intent("recent transactions please"), Some(Intent::History));
    }

    #[test]
    fn meme_requires_an_address() {
        assert_eq!(
            parse_intent(&format!("analyze {ADDRESS}")),
            Some(Intent::Meme { address: ADDRESS.to_string() })
        );
        // without an address the price rule does not apply either, so nothing matches
        assert_eq!(parse_intent("analyze this meme"), None);
    }

    #[test]
    fn earlier_rules_win() {
        // history outranks balance
        assert_eq!(parse_intent("balance history"), Some(Intent::History));
        // help outranks send
        assert_eq!(parse_intent(&format!("help me send 1 SOL to {ADDRESS}")), Some(Intent::Help));
        // greeting only matches a bare salutation
        assert_eq!(
            parse_intent("hey swap 1 sol to usdc"),
            Some(Intent::Swap { from_token: "SOL".to_string(), to_token: "USDC".to_string(), amount: 1.0 })
        );
    }

    #[test]
    fn unmatched_text_yields_none() {
        assert_eq!(parse_intent("asdf qwerty"), None);
    }
}
