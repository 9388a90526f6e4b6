use chrono::NaiveDate;
use thiserror::Error;

use crate::catalog::LodgingRecord;

/// Budget ceiling applied when the caller omits `max_price`.
pub const DEFAULT_MAX_PRICE: u32 = 500;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StayError {
    #[error("{field} date `{input}` is not a valid calendar date: {source}")]
    InvalidDate { field: &'static str, input: String, source: chrono::ParseError },
    #[error("Check-out date must be after check-in date.")]
    CheckOutNotAfterCheckIn,
}

/// A validated stay-date range. Construction is the only validation gate; once
/// a request exists, the query below is total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StayRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub max_price: u32,
}

impl StayRequest {
    pub fn parse(
        check_in_date: &str,
        check_out_date: &str,
        max_price: u32,
    ) -> Result<Self, StayError> {
        let check_in = parse_date("check-in", check_in_date)?;
        let check_out = parse_date("check-out", check_out_date)?;

        if check_out <= check_in {
            return Err(StayError::CheckOutNotAfterCheckIn);
        }

        Ok(Self { check_in, check_out, max_price })
    }

    pub fn nights(&self) -> u32 {
        // check_out > check_in is guaranteed by parse, so the difference is
        // at least one whole day.
        (self.check_out - self.check_in).num_days() as u32
    }
}

/// Per-hotel cost derived for a validated request. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StayQuote {
    pub nights: u32,
    pub total_cost: u64,
}

impl StayQuote {
    pub fn for_record(record: &LodgingRecord, nights: u32) -> Self {
        Self { nights, total_cost: u64::from(record.price_per_night) * u64::from(nights) }
    }
}

/// The availability query: filter the catalog by nightly price and format a
/// listing with per-hotel totals for the requested stay.
///
/// Every outcome, including invalid input, is reported as the returned string.
/// The function is pure: identical inputs produce byte-identical output, and
/// it is safe to call concurrently since the catalog is read-only.
pub fn find_available(
    catalog: &[LodgingRecord],
    check_in_date: &str,
    check_out_date: &str,
    max_price: u32,
) -> String {
    let request = match StayRequest::parse(check_in_date, check_out_date, max_price) {
        Ok(request) => request,
        Err(error @ StayError::InvalidDate { .. }) => {
            return format!(
                "Error parsing dates. Please use YYYY-MM-DD format. Details: {error}"
            );
        }
        Err(StayError::CheckOutNotAfterCheckIn) => {
            return "Error: Check-out date must be after check-in date.".to_string();
        }
    };

    let nights = request.nights();
    let affordable: Vec<&LodgingRecord> =
        catalog.iter().filter(|record| record.price_per_night <= request.max_price).collect();

    if affordable.is_empty() {
        return format!(
            "No hotels found in Seattle within your budget of ${max_price}/night."
        );
    }

    let mut result = format!(
        "Available hotels in Seattle from {check_in_date} to {check_out_date} ({nights} nights):\n\n"
    );

    // Insertion order, no sort.
    for record in affordable {
        let quote = StayQuote::for_record(record, nights);
        result.push_str(&format!("**{}**\n", record.name));
        result.push_str(&format!("   Location: {}\n", record.location));
        result.push_str(&format!("   Rating: {:.1}/5\n", record.rating));
        result.push_str(&format!(
            "   ${}/night (Total: ${})\n\n",
            record.price_per_night, quote.total_cost
        ));
    }

    result
}

fn parse_date(field: &'static str, input: &str) -> Result<NaiveDate, StayError> {
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|source| StayError::InvalidDate {
        field,
        input: input.to_string(),
        source,
    })
}
