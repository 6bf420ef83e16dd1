//! Order execution port trait used by live sessions.

use crate::domain::error::CointraderError;

/// Exchange response to an order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAck {
    Accepted { order_id: String },
    Rejected { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Done,
}

/// Limit-order interface of an exchange. Credentials and clients are passed
/// to the implementing adapter's constructor.
pub trait ExchangePort {
    fn buy(&self, pair: &str, amount_base: f64, limit_price: f64)
    -> Result<OrderAck, CointraderError>;

    fn sell(&self, pair: &str, amount_base: f64, limit_price: f64)
    -> Result<OrderAck, CointraderError>;

    fn order_status(&self, order_id: &str) -> Result<OrderStatus, CointraderError>;
}
