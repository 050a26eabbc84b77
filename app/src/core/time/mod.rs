mod datetime;
mod range;

pub use datetime::DateTime;
pub use range::DateRange;

#[cfg(test)]
pub use datetime::FIXED_NOW;
