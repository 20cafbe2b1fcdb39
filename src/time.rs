//! Conversion between ZIP's packed DOS timestamp and seconds-since-epoch.
//!
//! DOS time packs seconds/2, minutes, and hours into a `u16`; DOS date packs
//! day, month, and year-since-1980 into a second `u16`. See APPNOTE.TXT
//! section 4.4.6. `piz`'s `spec::parse_msdos` does the read direction with
//! `chrono`; this crate adds the inverse for the writer.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// The DOS epoch: 1980-01-01 00:00:00, used whenever a stored timestamp is
/// out of DOS's representable range.
fn dos_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1980, 1, 1)
        .expect("1980-01-01 is representable")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is representable")
}

/// Converts a packed DOS (time, date) pair to seconds-since-epoch (UTC).
///
/// Out-of-range fields (an invalid day/month, an hour > 23, ...) fall back to
/// the canonical DOS epoch rather than failing, matching how real-world
/// archives with garbage timestamps are still expected to open.
pub fn dos_to_epoch(time: u16, date: u16) -> i64 {
    let seconds = ((time & 0b0001_1111) as u32) * 2;
    let minutes = ((time >> 5) & 0b0011_1111) as u32;
    let hours = ((time >> 11) & 0b0001_1111) as u32;

    let day = ((date & 0b0001_1111) as u32).max(1);
    let month = ((date >> 5) & 0b0000_1111) as u32;
    let year = (((date >> 9) & 0b0111_1111) as i32) + 1980;

    let naive = NaiveDate::from_ymd_opt(year, month.max(1), day)
        .and_then(|d| d.and_hms_opt(hours, minutes, seconds))
        .unwrap_or_else(dos_epoch);

    Utc.from_utc_datetime(&naive).timestamp()
}

/// Converts seconds-since-epoch (UTC) to a packed DOS (time, date) pair.
///
/// Instants before the DOS epoch, or after the last DOS-representable year
/// (2107), are clamped to the DOS epoch, the same canonicalization the read
/// direction applies to out-of-range stored values.
pub fn epoch_to_dos(epoch_seconds: i64) -> (u16, u16) {
    let dt = Utc
        .timestamp_opt(epoch_seconds, 0)
        .single()
        .map(|dt| dt.naive_utc())
        .unwrap_or_else(dos_epoch);

    let dt = if dt < dos_epoch() { dos_epoch() } else { dt };
    let year = dt.year() - 1980;
    if !(0..=127).contains(&year) {
        return dos_time_date(&dos_epoch());
    }
    dos_time_date(&dt)
}

fn dos_time_date(dt: &NaiveDateTime) -> (u16, u16) {
    let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | ((dt.second() / 2) as u16);
    let date = (((dt.year() - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | (dt.day() as u16);
    (time, date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_roundtrips_through_dos_with_two_second_precision() {
        let original = Utc
            .with_ymd_and_hms(2021, 6, 15, 13, 37, 42)
            .unwrap()
            .timestamp();
        let (time, date) = epoch_to_dos(original);
        let back = dos_to_epoch(time, date);
        assert_eq!(back, original - 0); // 42 is even, no rounding loss
    }

    #[test]
    fn pre_1980_instant_clamps_to_dos_epoch() {
        let (time, date) = epoch_to_dos(0);
        assert_eq!((time, date), (0, 0b0000_0000_0010_0001));
    }

    #[test]
    fn zeroed_dos_timestamp_is_the_dos_epoch() {
        assert_eq!(dos_to_epoch(0, 0b0000_0000_0010_0001), {
            Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).unwrap().timestamp()
        });
    }
}
