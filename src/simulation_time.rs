/// Hour-of-year bookkeeping for the fixed 8760-hour simulation year (no leap day).
use crate::core::units::HOURS_PER_DAY;

// Hours that start each month (and end the previous one). There are 13 values
// so that the end of the final month is handled correctly, e.g. Jan is hours 0-743.
pub(crate) const MONTH_START_END_HOURS: [u32; 13] = [
    0, 744, 1416, 2160, 2880, 3624, 4344, 5088, 5832, 6552, 7296, 8016, 8760,
];

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub const ANNUAL_PERIOD: &str = "Annual";

/// One hour of the simulation year.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YearHour {
    pub index: usize,
    /// 1 = January
    pub month: u8,
    /// 1 = January 1st
    pub day_of_year: u16,
}

impl YearHour {
    pub fn from_index(index: usize) -> Option<Self> {
        let hour = u32::try_from(index).ok()?;
        let month = MONTH_START_END_HOURS
            .iter()
            .skip(1)
            .position(|end_hour| hour < *end_hour)?;

        Some(Self {
            index,
            month: (month + 1) as u8,
            day_of_year: (hour / HOURS_PER_DAY + 1) as u16,
        })
    }
}
