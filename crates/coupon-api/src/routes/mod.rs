//! API Routes

pub mod coupon;
pub mod health;
