//! Temporal value formatting.
//!
//! The engine stores dates as days and timestamps as microseconds since
//! 2000-01-01. Conversion goes through Julian day numbers, the same way the
//! engine itself does it.

/// Julian day number of 2000-01-01, the engine epoch.
const EPOCH_JDATE: i64 = 2_451_545;

const USECS_PER_DAY: i64 = 86_400_000_000;
const USECS_PER_HOUR: i64 = 3_600_000_000;
const USECS_PER_MINUTE: i64 = 60_000_000;
const USECS_PER_SEC: i64 = 1_000_000;

/// Converts a Julian day number to (year, month, day).
fn julian_to_date(jd: i64) -> (i64, u32, u32) {
    let mut julian = (jd + 32_044) as u64;
    let mut quad = julian / 146_097;
    let extra = (julian - quad * 146_097) * 4 + 3;
    julian += 60 + quad * 3 + extra / 146_097;
    quad = julian / 1461;
    julian -= quad * 1461;
    let mut y = julian * 4 / 1461;
    julian = if y != 0 {
        (julian + 305) % 365
    } else {
        (julian + 306) % 366
    } + 123;
    y += quad * 4;
    let year = y as i64 - 4800;
    quad = julian * 2141 / 65_536;
    let day = (julian - 7834 * quad / 256) as u32;
    let month = ((quad + 10) % 12 + 1) as u32;
    (year, month, day)
}

/// Formats a date stored as days since the engine epoch.
pub fn format_date(days: i32) -> String {
    let (y, m, d) = julian_to_date(i64::from(days) + EPOCH_JDATE);
    if y > 0 {
        format!("{y:04}-{m:02}-{d:02}")
    } else {
        // Year zero does not exist; Julian year 0 is 1 BC
        format!("{:04}-{m:02}-{d:02} BC", 1 - y)
    }
}

/// Formats a time-of-day stored as microseconds since midnight.
pub fn format_time(usecs: i64) -> String {
    let hours = usecs / USECS_PER_HOUR;
    let minutes = (usecs / USECS_PER_MINUTE) % 60;
    let seconds = (usecs / USECS_PER_SEC) % 60;
    let micros = usecs % USECS_PER_SEC;
    if micros == 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        let frac = format!("{micros:06}");
        format!("{hours:02}:{minutes:02}:{seconds:02}.{}", frac.trim_end_matches('0'))
    }
}

/// Formats a timestamp stored as microseconds since the engine epoch.
/// Zone-aware timestamps are stored in UTC; `with_zone` appends the marker.
pub fn format_timestamp(usecs: i64, with_zone: bool) -> String {
    if usecs == i64::MAX {
        return "infinity".to_string();
    }
    if usecs == i64::MIN {
        return "-infinity".to_string();
    }

    let days = usecs.div_euclid(USECS_PER_DAY);
    let tod = usecs.rem_euclid(USECS_PER_DAY);

    let days = match i32::try_from(days) {
        Ok(d) => d,
        Err(_) => return format!("{usecs} us"),
    };

    let date = format_date(days);
    let time = format_time(tod);
    if with_zone {
        format!("{date} {time}+00")
    } else {
        format!("{date} {time}")
    }
}

/// Formats a zoned time-of-day: microseconds since midnight plus a zone
/// displacement in seconds west of UTC.
pub fn format_timetz(usecs: i64, zone_secs: i32) -> String {
    // Stored displacement is west-positive; display is east-positive
    let offset = -zone_secs;
    let sign = if offset < 0 { '-' } else { '+' };
    let abs = offset.unsigned_abs();
    let (oh, om) = (abs / 3600, (abs / 60) % 60);
    let time = format_time(usecs);
    if om == 0 {
        format!("{time}{sign}{oh:02}")
    } else {
        format!("{time}{sign}{oh:02}:{om:02}")
    }
}

/// Formats an interval from its stored (microseconds, days, months) triple.
pub fn format_interval(usecs: i64, days: i32, months: i32) -> String {
    let mut parts = Vec::new();

    let years = months / 12;
    let months = months % 12;
    if years != 0 {
        parts.push(format!("{years} year{}", plural(years)));
    }
    if months != 0 {
        parts.push(format!("{months} mon{}", plural(months)));
    }
    if days != 0 {
        parts.push(format!("{days} day{}", plural(days)));
    }

    if usecs != 0 || parts.is_empty() {
        let neg = usecs < 0;
        let abs = usecs.unsigned_abs() as i64;
        let hours = abs / USECS_PER_HOUR;
        let minutes = (abs / USECS_PER_MINUTE) % 60;
        let seconds = (abs / USECS_PER_SEC) % 60;
        let micros = abs % USECS_PER_SEC;
        let sign = if neg { "-" } else { "" };
        if micros == 0 {
            parts.push(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"));
        } else {
            let frac = format!("{micros:06}");
            parts.push(format!(
                "{sign}{hours:02}:{minutes:02}:{seconds:02}.{}",
                frac.trim_end_matches('0')
            ));
        }
    }

    parts.join(" ")
}

fn plural(n: i32) -> &'static str {
    if n == 1 || n == -1 {
        ""
    } else {
        "s"
    }
}
