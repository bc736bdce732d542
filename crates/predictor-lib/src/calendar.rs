//! National holiday calendars used for calendar features
//!
//! Holidays are generated per year from fixed dates, weekday rules and the
//! Easter computus, so no calendar data has to ship with the model.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A named public holiday
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: &'static str,
}

/// Holiday proximity flags for a single day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HolidayFlags {
    pub is_holiday: bool,
    pub is_day_before_holiday: bool,
    pub is_day_after_holiday: bool,
}

/// Supported national calendars
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayCalendar {
    #[default]
    #[serde(alias = "br")]
    Brazil,
    #[serde(alias = "us", alias = "usa")]
    UnitedStates,
}

impl HolidayCalendar {
    /// All holidays falling in `year`, ordered by date
    pub fn holidays(&self, year: i32) -> Vec<Holiday> {
        let mut holidays = match self {
            HolidayCalendar::Brazil => brazil(year),
            HolidayCalendar::UnitedStates => united_states(year),
        };
        holidays.sort_by_key(|h| h.date);
        holidays
    }

    /// Name of the holiday on `date`, if any
    pub fn holiday_name(&self, date: NaiveDate) -> Option<&'static str> {
        // Observed US dates can spill into the neighbouring year
        self.holidays_around(date.year()).get(&date).copied()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_name(date).is_some()
    }

    /// Holiday, eve and day-after flags for `date`
    pub fn flags(&self, date: NaiveDate) -> HolidayFlags {
        let holidays = self.holidays_around(date.year());
        let is = |d: Option<NaiveDate>| d.map(|d| holidays.contains_key(&d)).unwrap_or(false);

        HolidayFlags {
            is_holiday: holidays.contains_key(&date),
            is_day_before_holiday: is(date.succ_opt()),
            is_day_after_holiday: is(date.pred_opt()),
        }
    }

    fn holidays_around(&self, year: i32) -> BTreeMap<NaiveDate, &'static str> {
        (year - 1..=year + 1)
            .flat_map(|y| self.holidays(y))
            .map(|h| (h.date, h.name))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayCalendar::Brazil => "brazil",
            HolidayCalendar::UnitedStates => "united_states",
        }
    }
}

impl fmt::Display for HolidayCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HolidayCalendar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "brazil" | "br" => Ok(HolidayCalendar::Brazil),
            "united_states" | "us" | "usa" => Ok(HolidayCalendar::UnitedStates),
            other => Err(format!("unknown holiday calendar '{}'", other)),
        }
    }
}

/// Easter Sunday (anonymous Gregorian algorithm)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn fixed(year: i32, month: u32, day: u32, name: &'static str) -> Option<Holiday> {
    NaiveDate::from_ymd_opt(year, month, day).map(|date| Holiday { date, name })
}

fn brazil(year: i32) -> Vec<Holiday> {
    let good_friday = easter_sunday(year).map(|easter| Holiday {
        date: easter - Duration::days(2),
        name: "Good Friday",
    });

    [
        fixed(year, 1, 1, "Universal Fraternization Day"),
        good_friday,
        fixed(year, 4, 21, "Tiradentes' Day"),
        fixed(year, 5, 1, "Worker's Day"),
        fixed(year, 9, 7, "Independence Day"),
        fixed(year, 10, 12, "Our Lady of Aparecida"),
        fixed(year, 11, 2, "All Souls' Day"),
        fixed(year, 11, 15, "Republic Proclamation Day"),
        (year >= 2024)
            .then(|| fixed(year, 11, 20, "National Day of Zumbi and Black Consciousness"))
            .flatten(),
        fixed(year, 12, 25, "Christmas Day"),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8, name: &'static str) -> Option<Holiday> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n).map(|date| Holiday { date, name })
}

fn last_weekday(year: i32, month: u32, weekday: Weekday, name: &'static str) -> Option<Holiday> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    let mut date = first_of_next.pred_opt()?;
    while date.weekday() != weekday {
        date = date.pred_opt()?;
    }
    Some(Holiday { date, name })
}

/// Weekend-dated fixed holidays are also observed on the nearest weekday
fn with_observed(holiday: Option<Holiday>, observed_name: &'static str) -> Vec<Holiday> {
    let Some(holiday) = holiday else {
        return Vec::new();
    };
    let shift = match holiday.date.weekday() {
        Weekday::Sat => Some(-1),
        Weekday::Sun => Some(1),
        _ => None,
    };
    let observed = shift.map(|days| Holiday {
        date: holiday.date + Duration::days(days),
        name: observed_name,
    });
    std::iter::once(holiday).chain(observed).collect()
}

fn united_states(year: i32) -> Vec<Holiday> {
    let mut holidays = Vec::new();
    holidays.extend(with_observed(
        fixed(year, 1, 1, "New Year's Day"),
        "New Year's Day (observed)",
    ));
    holidays.extend(nth_weekday(year, 1, Weekday::Mon, 3, "Martin Luther King Jr. Day"));
    holidays.extend(nth_weekday(year, 2, Weekday::Mon, 3, "Washington's Birthday"));
    holidays.extend(last_weekday(year, 5, Weekday::Mon, "Memorial Day"));
    if year >= 2021 {
        holidays.extend(with_observed(
            fixed(year, 6, 19, "Juneteenth National Independence Day"),
            "Juneteenth National Independence Day (observed)",
        ));
    }
    holidays.extend(with_observed(
        fixed(year, 7, 4, "Independence Day"),
        "Independence Day (observed)",
    ));
    holidays.extend(nth_weekday(year, 9, Weekday::Mon, 1, "Labor Day"));
    holidays.extend(nth_weekday(year, 10, Weekday::Mon, 2, "Columbus Day"));
    holidays.extend(with_observed(
        fixed(year, 11, 11, "Veterans Day"),
        "Veterans Day (observed)",
    ));
    holidays.extend(nth_weekday(year, 11, Weekday::Thu, 4, "Thanksgiving Day"));
    holidays.extend(with_observed(
        fixed(year, 12, 25, "Christmas Day"),
        "Christmas Day (observed)",
    ));
    holidays
}
