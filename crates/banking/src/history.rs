//! Date-range filtering for transaction history.

use std::collections::HashSet;

use chrono::{DateTime, Days, NaiveDate, Utc};

use ledgerbank_core::{DomainError, DomainResult};

use crate::Transaction;

/// Half-open UTC interval `[from, to_exclusive)`; either end may be open.
///
/// Built from calendar dates: the start date counts from its midnight and the
/// end date is included through its last instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to_exclusive: Option<DateTime<Utc>>,
}

impl DateRange {
    pub const UNBOUNDED: DateRange = DateRange {
        from: None,
        to_exclusive: None,
    };

    /// Parse optional `YYYY-MM-DD` bounds. Empty strings count as absent.
    pub fn from_dates(start: Option<&str>, end: Option<&str>) -> DomainResult<Self> {
        let from = parse_date(start)?.map(start_of_day);
        let to_exclusive = match parse_date(end)? {
            Some(date) => Some(start_of_day(date.checked_add_days(Days::new(1)).ok_or_else(
                || DomainError::invalid_argument(format!("end date {date} is out of range")),
            )?)),
            None => None,
        };
        Ok(Self { from, to_exclusive })
    }

    /// True when no instant can fall inside the range (start after end).
    pub fn is_empty(&self) -> bool {
        matches!((self.from, self.to_exclusive), (Some(from), Some(to)) if from >= to)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to_exclusive.is_none_or(|to| at < to)
    }
}

fn parse_date(value: Option<&str>) -> DomainResult<Option<NaiveDate>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| DomainError::invalid_argument(format!("invalid date '{raw}', expected YYYY-MM-DD"))),
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// De-duplicate by id and order newest first (ties broken by id, descending).
pub fn newest_first(rows: impl IntoIterator<Item = Transaction>) -> Vec<Transaction> {
    let mut seen = HashSet::new();
    let mut rows: Vec<Transaction> = rows.into_iter().filter(|t| seen.insert(t.id)).collect();
    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ledgerbank_core::{AccountId, Amount};
    use rust_decimal::Decimal;

    use crate::{AccountNumber, AccountRef};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn end_date_is_inclusive_through_end_of_day() {
        let range = DateRange::from_dates(Some("2024-03-01"), Some("2024-03-31")).unwrap();
        assert!(range.contains(at(2024, 3, 1, 0, 0, 0)));
        assert!(range.contains(at(2024, 3, 31, 23, 59, 59)));
        assert!(!range.contains(at(2024, 4, 1, 0, 0, 0)));
        assert!(!range.contains(at(2024, 2, 29, 23, 59, 59)));
    }

    #[test]
    fn empty_strings_mean_unbounded() {
        let range = DateRange::from_dates(Some(""), None).unwrap();
        assert_eq!(range, DateRange::UNBOUNDED);
        assert!(range.contains(at(1999, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn malformed_date_is_invalid_argument() {
        assert!(matches!(
            DateRange::from_dates(Some("03/01/2024"), None),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(DateRange::from_dates(None, Some("2024-02-30")).is_err());
    }

    #[test]
    fn start_after_end_is_empty() {
        let range = DateRange::from_dates(Some("2024-03-02"), Some("2024-03-01")).unwrap();
        assert!(range.is_empty());
        let same_day = DateRange::from_dates(Some("2024-03-01"), Some("2024-03-01")).unwrap();
        assert!(!same_day.is_empty());
    }

    #[test]
    fn newest_first_dedupes_and_orders() {
        let account = AccountRef {
            id: AccountId::new(),
            number: AccountNumber::parse("1234567890").unwrap(),
        };
        let amount = Amount::new(Decimal::ONE).unwrap();
        let t0 = at(2024, 1, 1, 12, 0, 0);
        let older = Transaction::deposit(account.clone(), amount, t0);
        let newer = Transaction::deposit(account.clone(), amount, t0 + Duration::hours(1));
        let [debit, credit] = Transaction::transfer(
            account.clone(),
            AccountRef {
                id: AccountId::new(),
                number: AccountNumber::parse("0987654321").unwrap(),
            },
            amount,
            t0,
        );

        let ordered = newest_first(vec![
            older.clone(),
            debit.clone(),
            newer.clone(),
            credit.clone(),
            older.clone(),
        ]);

        assert_eq!(ordered.len(), 4);
        assert_eq!(ordered[0].id, newer.id);
        // Same timestamp: higher id first.
        let tied: Vec<_> = ordered[1..].iter().map(|t| t.id).collect();
        let mut expected = vec![older.id, debit.id, credit.id];
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(tied, expected);
    }
}
