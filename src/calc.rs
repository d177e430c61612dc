use serde::Serialize;

/// Two-decimal rounding used for attendance percentages. Exact halves go to
/// the even neighbour, so 3.125 becomes 3.12.
pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceTally {
    pub attended: usize,
    pub delivered: usize,
    pub percent: f64,
}

/// Tallies one student's sessions for one subject. `present` holds one flag
/// per ledger row; no rows means nothing was delivered and the percentage
/// is 0.
pub fn attendance_tally<I>(present: I) -> AttendanceTally
where
    I: IntoIterator<Item = bool>,
{
    let mut attended: usize = 0;
    let mut delivered: usize = 0;
    for p in present {
        delivered += 1;
        if p {
            attended += 1;
        }
    }
    AttendanceTally {
        attended,
        delivered,
        percent: attendance_percent(attended, delivered),
    }
}

pub fn attendance_percent(attended: usize, delivered: usize) -> f64 {
    if delivered == 0 {
        return 0.0;
    }
    round_off_2_decimals(100.0 * (attended as f64) / (delivered as f64))
}
