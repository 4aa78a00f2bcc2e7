//! Pricing
//!
//! Pure quote calculation over an immutable [`PricingPolicy`].

pub mod model;

pub use model::{
    quote, quote_window, BaseRates, DiscountTier, HourRange, PriceBreakdown, PricingPolicy,
};
