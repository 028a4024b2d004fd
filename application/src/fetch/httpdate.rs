//! IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`) helpers for the
//! conditional-fetch headers.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

const IMF_FIXDATE: &'static [BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Render epoch seconds as an HTTP date. `None` for timestamps outside the
/// representable range.
#[must_use]
pub fn format_http_date(epoch: i64) -> Option<String> {
    let datetime = OffsetDateTime::from_unix_timestamp(epoch).ok()?;
    datetime.format(&IMF_FIXDATE).ok()
}

/// Parse an HTTP date into epoch seconds. `None` on any malformed input;
/// callers fall back to the current time.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<i64> {
    let datetime = PrimitiveDateTime::parse(value.trim(), &IMF_FIXDATE).ok()?;
    Some(datetime.assume_utc().unix_timestamp())
}
