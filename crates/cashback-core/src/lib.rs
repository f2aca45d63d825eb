pub mod parse;
pub mod period;
pub mod row;

pub use parse::{ParseError, parse_rows};
pub use period::{current_period, period_start};
pub use row::{Row, RowField};
