use solana_sdk::native_token::LAMPORTS_PER_SOL;

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Convert SOL to lamports, rounding to the nearest lamport
pub fn sol_to_lamports(sol: f64) -> u64 {
    to_base_units(sol, 9)
}

/// Convert a UI amount into raw token units for the given decimals
pub fn to_base_units(amount: f64, decimals: u8) -> u64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount * 10f64.powi(decimals as i32)).round() as u64
}

/// Convert raw token units into a UI amount
pub fn from_base_units(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}
