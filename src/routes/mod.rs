pub mod admin;
pub mod coupon;
pub mod order;
pub mod spin;
pub mod verify;
