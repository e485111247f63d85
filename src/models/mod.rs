pub mod intent;
pub mod operation;
pub mod token;
pub mod wallet;

pub use intent::Intent;
pub use operation::{ErrorKind, OperationResult, SwapRequest, TransferRequest};
pub use token::{KnownToken, KNOWN_TOKENS, NATIVE_SOL_MINT};
pub use wallet::{TokenBalance, WalletSnapshot};
