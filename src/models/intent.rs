use serde::{Deserialize, Serialize};

/// Structured classification of one user turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Intent {
    Greeting,
    Help,
    Balance,
    History,
    /// `symbol: None` asks for a market overview rather than a single coin
    Price {
        symbol: Option<String>,
    },
    Meme {
        address: String,
    },
    Send {
        recipient: String,
        amount: f64,
        #[serde(rename = "fromToken")]
        token: String,
    },
    Swap {
        #[serde(rename = "fromToken")]
        from_token: String,
        #[serde(rename = "toToken")]
        to_token: String,
        amount: f64,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Help => "help",
            Self::Balance => "balance",
            Self::History => "history",
            Self::Price { .. } => "price",
            Self::Meme { .. } => "meme",
            Self::Send { .. } => "send",
            Self::Swap { .. } => "swap",
        }
    }
}
