use chrono::{
  Local,
  NaiveDate
};

const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";
const DISPLAY_DATE_FORMAT: &str =
  "%b %-d, %Y";

/// Parses a calendar date out of either
/// a plain `YYYY-MM-DD` or a timestamp
/// such as `2024-01-01T00:00:00.000Z`.
///
/// Only the leading date is read. The
/// time and offset are discarded rather
/// than converted, so a date never
/// shifts by a day depending on where
/// the client runs.
#[must_use]
pub fn parse_calendar_date(
  raw: &str
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  let date_part = match trimmed
    .char_indices()
    .find(|(_, ch)| {
      *ch == 'T' || *ch == ' '
    }) {
    | Some((idx, _)) => &trimmed[..idx],
    | None => trimmed
  };

  if date_part.len() != 10 {
    return None;
  }

  NaiveDate::parse_from_str(
    date_part,
    ISO_DATE_FORMAT
  )
  .ok()
}

#[must_use]
pub fn format_iso_date(
  date: NaiveDate
) -> String {
  date
    .format(ISO_DATE_FORMAT)
    .to_string()
}

/// `Jan 1, 2024`.
#[must_use]
pub fn format_display_date(
  date: NaiveDate
) -> String {
  date
    .format(DISPLAY_DATE_FORMAT)
    .to_string()
}

#[must_use]
pub fn today() -> NaiveDate {
  Local::now().date_naive()
}
