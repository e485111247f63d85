use serde::Serialize;

/// Mint used to represent native SOL inside token listings
pub const NATIVE_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// SPL Token program, owner of every classic token account
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// A token the assistant knows by symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnownToken {
    pub symbol: &'static str,
    pub name: &'static str,
    pub mint: &'static str,
    pub decimals: u8,
    pub stablecoin: bool,
    pub coingecko_id: &'static str,
}

impl KnownToken {
    pub fn is_native(&self) -> bool {
        self.mint == NATIVE_SOL_MINT
    }
}

/// Tokens supported for transfers, swaps and amount extraction
pub const KNOWN_TOKENS: &[KnownToken] = &[
    KnownToken {
        symbol: "SOL",
        name: "Solana",
        mint: NATIVE_SOL_MINT,
        decimals: 9,
        stablecoin: false,
        coingecko_id: "solana",
    },
    KnownToken {
        symbol: "USDC",
        name: "USD Coin",
        mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        decimals: 6,
        stablecoin: true,
        coingecko_id: "usd-coin",
    },
    KnownToken {
        symbol: "USDT",
        name: "Tether USD",
        mint: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        decimals: 6,
        stablecoin: true,
        coingecko_id: "tether",
    },
    KnownToken {
        symbol: "BONK",
        name: "Bonk",
        mint: "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
        decimals: 5,
        stablecoin: false,
        coingecko_id: "bonk",
    },
    KnownToken {
        symbol: "JUP",
        name: "Jupiter",
        mint: "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN",
        decimals: 6,
        stablecoin: false,
        coingecko_id: "jupiter-exchange-solana",
    },
    KnownToken {
        symbol: "RAY",
        name: "Raydium",
        mint: "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R",
        decimals: 6,
        stablecoin: false,
        coingecko_id: "raydium",
    },
    KnownToken {
        symbol: "WIF",
        name: "dogwifhat",
        mint: "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm",
        decimals: 6,
        stablecoin: false,
        coingecko_id: "dogwifcoin",
    },
];

/// Case-insensitive lookup by ticker
pub fn token_by_symbol(symbol: &str) -> Option<&'static KnownToken> {
    KNOWN_TOKENS.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

pub fn token_by_mint(mint: &str) -> Option<&'static KnownToken> {
    KNOWN_TOKENS.iter().find(|t| t.mint == mint)
}

/// Whether amounts in this symbol are dollar-pegged
pub fn is_stablecoin(symbol: &str) -> bool {
    token_by_symbol(symbol).map(|t| t.stablecoin).unwrap_or(false)
}
