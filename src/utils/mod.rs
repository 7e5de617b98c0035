//! Crate-internal helpers.

mod math;

pub use math::{is_even_power_of_two, low_mask, sign_extend};
