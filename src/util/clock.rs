//! Minute-granularity time helpers for publication visibility.

use time::OffsetDateTime;

/// Round `instant` up to the last representable moment of its minute.
///
/// Publication visibility is compared at minute granularity: a post whose
/// publish time falls anywhere inside the current minute is treated as
/// already visible.
pub fn end_of_minute(instant: OffsetDateTime) -> OffsetDateTime {
    instant
        .replace_second(59)
        .expect("59 is a valid second")
        .replace_nanosecond(999_999_999)
        .expect("valid nanosecond")
}

/// End of the current minute in UTC.
pub fn end_of_current_minute() -> OffsetDateTime {
    end_of_minute(OffsetDateTime::now_utc())
}
