//! CSV export of an event's registrations

use crate::registration::participant::Registration;

pub const CSV_HEADERS: [&str; 7] = [
    "Name",
    "Email",
    "Phone",
    "Department",
    "College",
    "Team Members",
    "Registered At",
];

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields.into_iter().map(quote).collect::<Vec<_>>().join(",")
}

/// Header plus one row per registration, every field quoted.
pub fn registrations_csv(registrations: &[Registration]) -> String {
    let mut lines = Vec::with_capacity(registrations.len() + 1);
    lines.push(row(CSV_HEADERS));

    for r in registrations {
        let team = r.team_members.join("; ");
        let registered_at = r.registered_at.format("%Y-%m-%d %H:%M:%S").to_string();
        lines.push(row([
            r.participant_name.as_str(),
            r.email.as_str(),
            r.phone.as_str(),
            r.department.as_str(),
            r.college.as_str(),
            team.as_str(),
            registered_at.as_str(),
        ]));
    }

    lines.join("\n")
}

/// Download name for the export, `{title}.csv`.
pub fn export_filename(title: Option<&str>) -> String {
    let stem: String = title
        .unwrap_or_default()
        .chars()
        .filter(|c| !matches!(c, '"' | '/' | '\\' | '\r' | '\n'))
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        "registrations.csv".to_string()
    } else {
        format!("{}.csv", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn registration(name: &str, college: &str, team: &[&str]) -> Registration {
        Registration {
            id: "r1".to_string(),
            participant_name: name.to_string(),
            email: "asha@college.edu".to_string(),
            phone: "9876543210".to_string(),
            department: "CSE".to_string(),
            college: college.to_string(),
            team_members: team.iter().map(|s| s.to_string()).collect(),
            registered_at: Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn header_row_is_quoted() {
        let csv = registrations_csv(&[]);
        assert_eq!(
            csv,
            "\"Name\",\"Email\",\"Phone\",\"Department\",\"College\",\"Team Members\",\"Registered At\""
        );
    }

    #[test]
    fn comma_inside_a_field_stays_inside_the_quotes() {
        let csv = registrations_csv(&[registration(
            "Asha",
            "Jeppiaar Engineering College, Chennai",
            &["Ravi", "Meena"],
        )]);

        let data_row = csv.lines().nth(1).unwrap();
        assert_eq!(
            data_row,
            "\"Asha\",\"asha@college.edu\",\"9876543210\",\"CSE\",\"Jeppiaar Engineering College, Chennai\",\"Ravi; Meena\",\"2026-03-15 09:30:00\""
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let csv = registrations_csv(&[registration("Asha \"AK\" K", "X", &[])]);
        assert!(csv.contains("\"Asha \"\"AK\"\" K\""));
        assert!(csv.ends_with(",\"\",\"2026-03-15 09:30:00\""));
    }

    #[test]
    fn filename_falls_back_when_title_is_missing() {
        assert_eq!(export_filename(Some("Code Relay")), "Code Relay.csv");
        assert_eq!(export_filename(Some("  ")), "registrations.csv");
        assert_eq!(export_filename(None), "registrations.csv");
        assert_eq!(export_filename(Some("a/b\"c")), "abc.csv");
    }
}
