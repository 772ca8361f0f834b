//! Closed-form controllers that sit between requested and applied state.

pub mod intensity;
