pub mod initiator;

pub use initiator::{
    mint_idempotency_key, WithdrawalInitiator, WithdrawalReceipt, WithdrawalRequest,
};

#[cfg(test)]
mod tests;
