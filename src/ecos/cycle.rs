use crate::utils::error::{LoaderError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ECOS 統計週期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Cycle {
    /// A: `YYYY`
    Annual,
    /// S: `YYYYS1` / `YYYYS2`
    SemiAnnual,
    /// Q: `YYYYQ1`..`YYYYQ4`
    Quarterly,
    /// M: `YYYYMM`
    Monthly,
    /// SM: `YYYYMMS1` / `YYYYMMS2`
    SemiMonthly,
    /// D: `YYYYMMDD`
    Daily,
}

fn invalid_period(cycle: Cycle, period: &str, reason: &str) -> LoaderError {
    LoaderError::InvalidConfigValueError {
        field: "period".to_string(),
        value: period.to_string(),
        reason: format!("{} (cycle {} expects {})", reason, cycle.code(), cycle.pattern()),
    }
}

fn digits(s: &str) -> Option<u32> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

impl Cycle {
    pub const ALL: [Cycle; 6] = [
        Cycle::Annual,
        Cycle::SemiAnnual,
        Cycle::Quarterly,
        Cycle::Monthly,
        Cycle::SemiMonthly,
        Cycle::Daily,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Cycle::Annual => "A",
            Cycle::SemiAnnual => "S",
            Cycle::Quarterly => "Q",
            Cycle::Monthly => "M",
            Cycle::SemiMonthly => "SM",
            Cycle::Daily => "D",
        }
    }

    pub fn pattern(&self) -> &'static str {
        match self {
            Cycle::Annual => "YYYY",
            Cycle::SemiAnnual => "YYYYS1",
            Cycle::Quarterly => "YYYYQ1",
            Cycle::Monthly => "YYYYMM",
            Cycle::SemiMonthly => "YYYYMMS1",
            Cycle::Daily => "YYYYMMDD",
        }
    }

    pub fn validate_period(&self, period: &str) -> Result<()> {
        self.period_start(period).map(|_| ())
    }

    /// 期間的第一天；同時負責格式檢查
    pub fn period_start(&self, period: &str) -> Result<NaiveDate> {
        let cycle = *self;
        if !period.is_ascii() || period.len() < 4 {
            return Err(invalid_period(cycle, period, "malformed period"));
        }
        let year = digits(&period[..4])
            .map(|y| y as i32)
            .ok_or_else(|| invalid_period(cycle, period, "year must be four digits"))?;
        let rest = &period[4..];

        let month_of = |s: &str| -> Result<u32> {
            match digits(s) {
                Some(m) if s.len() == 2 && (1..=12).contains(&m) => Ok(m),
                _ => Err(invalid_period(cycle, period, "month must be 01..12")),
            }
        };
        let half_of = |s: &str| -> Result<u32> {
            match s {
                "S1" => Ok(1),
                "S2" => Ok(2),
                _ => Err(invalid_period(cycle, period, "half must be S1 or S2")),
            }
        };

        let (month, day) = match cycle {
            Cycle::Annual if rest.is_empty() => (1, 1),
            Cycle::SemiAnnual if rest.len() == 2 => (if half_of(rest)? == 1 { 1 } else { 7 }, 1),
            Cycle::Quarterly if rest.len() == 2 && rest.starts_with('Q') => match digits(&rest[1..]) {
                Some(q) if (1..=4).contains(&q) => (3 * (q - 1) + 1, 1),
                _ => return Err(invalid_period(cycle, period, "quarter must be Q1..Q4")),
            },
            Cycle::Monthly if rest.len() == 2 => (month_of(rest)?, 1),
            Cycle::SemiMonthly if rest.len() == 4 => {
                let month = month_of(&rest[..2])?;
                (month, if half_of(&rest[2..])? == 1 { 1 } else { 16 })
            }
            Cycle::Daily if rest.len() == 4 => {
                let month = month_of(&rest[..2])?;
                let day = digits(&rest[2..])
                    .ok_or_else(|| invalid_period(cycle, period, "day must be two digits"))?;
                (month, day)
            }
            _ => return Err(invalid_period(cycle, period, "unexpected length")),
        };

        NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| invalid_period(cycle, period, "not a calendar date"))
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Cycle {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Cycle::ALL
            .into_iter()
            .find(|c| c.code() == upper)
            .ok_or_else(|| LoaderError::InvalidConfigValueError {
                field: "cycle".to_string(),
                value: s.to_string(),
                reason: "expected one of A, S, Q, M, SM, D".to_string(),
            })
    }
}

impl TryFrom<String> for Cycle {
    type Error = LoaderError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Cycle> for String {
    fn from(cycle: Cycle) -> Self {
        cycle.code().to_string()
    }
}
