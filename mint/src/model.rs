use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct GetMintQuery {
    pub amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostMintQuery {
    pub payment_hash: String,
}

/// An invoice the mint issued in response to `request_mint`, tracked through
/// its lifecycle: created unpaid, observed paid by the Lightning backend,
/// then issued once blind signatures have been returned for it. `issued`
/// only ever moves false -> true, and `mint()` must refuse to run twice for
/// the same hash once it is true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invoice {
    pub amount: u64,
    pub payment_hash: String,
    pub payment_request: String,
    pub paid: bool,
    pub issued: bool,
}

impl Invoice {
    pub fn new(amount: u64, payment_hash: String, payment_request: String) -> Self {
        Self {
            amount,
            payment_hash,
            payment_request,
            paid: false,
            issued: false,
        }
    }
}
