pub mod assignments;
pub mod countdown;

pub use countdown::{Countdown, CountdownTicker, Urgency};
