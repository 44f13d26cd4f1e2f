//! CSV export of member lists.

use crate::members::NetworkMember;
use std::borrow::Cow;

/// Header row of [`export_csv`].
pub const CSV_HEADER: &str = "name,email,level,join_date,referrals,points,status";

/// Render `members` as CSV, one row per member after the header.
///
/// Fields containing a comma, quote, CR or LF are quoted with embedded
/// quotes doubled. Lines end with `\n`; join dates are `YYYY-MM-DD` in UTC.
pub fn export_csv(members: &[NetworkMember]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + members.len() * 64);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for member in members {
        let user = &member.user;
        let row = [
            escape(&user.name),
            escape(&user.email),
            Cow::Owned(member.level.to_string()),
            Cow::Owned(user.join_date.format("%Y-%m-%d").to_string()),
            Cow::Owned(user.referrals_count.to_string()),
            Cow::Owned(user.points.to_string()),
            Cow::Borrowed(user.status.as_str()),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemberStatus, UserRecord};
    use chrono::{TimeZone, Utc};

    fn member(name: &str, email: &str) -> NetworkMember {
        let mut user = UserRecord::new("x".into(), name.into(), email.into(), "XXXXXXXX".into());
        user.join_date = Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap();
        user.points = 120;
        user.referrals_count = 2;
        NetworkMember { user, level: 1 }
    }

    #[test]
    fn empty_list_is_just_the_header() {
        assert_eq!(export_csv(&[]), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn plain_row() {
        let csv = export_csv(&[member("Alice", "alice@example.com")]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[1], "Alice,alice@example.com,1,2024-05-17,2,120,active");
    }

    #[test]
    fn commas_and_quotes_are_quoted() {
        let mut m = member("Doe, \"JD\" John", "jd@example.com");
        m.user.status = MemberStatus::Inactive;
        let csv = export_csv(&[m]);
        let expected = "\"Doe, \"\"JD\"\" John\",jd@example.com,1,2024-05-17,2,120,inactive\n";
        assert!(csv.ends_with(expected));
    }

    #[test]
    fn newlines_are_quoted() {
        assert_eq!(escape("a\nb"), "\"a\nb\"");
        assert_eq!(escape("plain"), "plain");
    }
}
