mod rupee;

pub mod helpers;
pub mod op;
mod secret;

pub use rupee::{Rupee, RupeeConversionError, NPR_CURRENCY_CODE, NPR_CURRENCY_CODE_LOWER};
pub use secret::Secret;
