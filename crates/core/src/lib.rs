//! Core data types for the cycle arbitrage detector.

pub mod exchange;
pub mod opportunity;
pub mod price;
pub mod quote_currency;
pub mod token;

pub use exchange::*;
pub use opportunity::*;
pub use price::*;
pub use quote_currency::*;
pub use token::*;
