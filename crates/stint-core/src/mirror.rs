//! Local mirror of recorded sessions
//!
//! Every recorded session is copied under `timing_<sessionId>`, whether or not
//! it reached the remote sink. The mirror backs the CSV export.

use std::borrow::Cow;
use std::io::{self, Write};

use chrono::{NaiveDate, SecondsFormat};

use crate::constants::storage::TIMING_PREFIX;
use crate::storage::KvStore;
use crate::timing::TimingRecord;

const CSV_HEADERS: [&str; 9] = [
    "Timestamp",
    "Email",
    "Session ID",
    "Start Time",
    "End Time",
    "Time Taken (seconds)",
    "Time Taken (minutes)",
    "Device Info",
    "Status",
];

pub struct LocalMirror<'a> {
    store: &'a KvStore,
}

impl<'a> LocalMirror<'a> {
    pub fn new(store: &'a KvStore) -> Self {
        Self { store }
    }

    pub fn mirror_key(session_id: &str) -> String {
        format!("{}{}", TIMING_PREFIX, session_id)
    }

    pub fn record(&self, record: &TimingRecord) -> bool {
        let saved = self
            .store
            .set(&Self::mirror_key(&record.session_id), record);
        if saved {
            tracing::info!(
                session_id = %record.session_id,
                email = record.email.as_deref().unwrap_or(""),
                minutes = record.time_taken_minutes,
                status = %record.status,
                "Timing data recorded"
            );
        }
        saved
    }

    pub fn load(&self, session_id: &str) -> Option<TimingRecord> {
        self.store.get(&Self::mirror_key(session_id))
    }

    /// All readable mirror entries, oldest first
    pub fn records(&self) -> Vec<TimingRecord> {
        let mut records: Vec<TimingRecord> = self
            .store
            .list_keys(TIMING_PREFIX)
            .iter()
            .filter_map(|key| self.store.get(key))
            .collect();
        records.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        records
    }

    /// Write every mirror entry as CSV; returns the number of data rows
    pub fn export_csv<W: Write>(&self, out: W) -> io::Result<usize> {
        let records = self.records();
        write_csv(&records, out)?;
        Ok(records.len())
    }
}

/// Default export file name for `date`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("survey_timing_data_{}.csv", date.format("%Y-%m-%d"))
}

pub fn write_csv<W: Write>(records: &[TimingRecord], mut out: W) -> io::Result<()> {
    writeln!(out, "{}", CSV_HEADERS.join(","))?;
    for record in records {
        let device = record.device_info.to_string();
        let row = [
            iso(&record.timestamp),
            escape(record.email.as_deref().unwrap_or("")).into_owned(),
            escape(&record.session_id).into_owned(),
            iso(&record.start_time),
            iso(&record.end_time),
            record.time_taken_seconds.to_string(),
            record.time_taken_minutes.to_string(),
            quote(&device),
            record.status.to_string(),
        ];
        writeln!(out, "{}", row.join(","))?;
    }
    out.flush()
}

fn iso(instant: &chrono::DateTime<chrono::Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        Cow::Owned(quote(field))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::storage::create_test_store;
    use crate::timing::{DeviceInfo, RecordBuilder};

    fn record(session_id: &str, email: Option<&str>, minutes_ago: i64) -> TimingRecord {
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap() - Duration::minutes(minutes_ago);
        RecordBuilder::default().build(
            session_id,
            end - Duration::seconds(125),
            end,
            email,
            &DeviceInfo {
                user_agent: "stint/0.1.0".to_string(),
                platform: "linux-x86_64".to_string(),
                language: "en-US".to_string(),
                timezone: "+00:00".to_string(),
                screen_size: None,
                window_size: None,
            },
        )
    }

    #[test]
    fn test_record_and_load() {
        let (store, _temp) = create_test_store();
        let mirror = LocalMirror::new(&store);
        let original = record("s1", Some("ana@example.com"), 0);

        assert!(mirror.record(&original));
        assert_eq!(mirror.load("s1"), Some(original));
        assert_eq!(store.list_keys("timing_"), vec!["timing_s1"]);
    }

    #[test]
    fn test_records_skip_backups_and_corrupted_entries() {
        let (store, _temp) = create_test_store();
        let mirror = LocalMirror::new(&store);
        mirror.record(&record("late", None, 0));
        mirror.record(&record("early", None, 30));
        store.set("backup_other", &record("other", None, 5));
        store.set_raw("timing_broken", "nope");

        let ids: Vec<String> = mirror.records().into_iter().map(|r| r.session_id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_export_csv() {
        let (store, _temp) = create_test_store();
        let mirror = LocalMirror::new(&store);
        mirror.record(&record("s1", Some("ana@example.com"), 0));

        let mut out = Vec::new();
        let rows = mirror.export_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(rows, 1);
        assert_eq!(
            lines[0],
            "Timestamp,Email,Session ID,Start Time,End Time,Time Taken (seconds),Time Taken (minutes),Device Info,Status"
        );
        assert_eq!(
            lines[1],
            "2026-03-01T10:00:00.000Z,ana@example.com,s1,2026-03-01T09:57:55.000Z,2026-03-01T10:00:00.000Z,125,2,\"userAgent=stint/0.1.0; platform=linux-x86_64; language=en-US; timezone=+00:00\",completed"
        );
    }

    #[test]
    fn test_export_escapes_awkward_fields() {
        let awkward = record("s,1", Some("a\"b@example.com"), 0);
        let mut out = Vec::new();
        write_csv(&[awkward], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();

        assert!(row.contains(",\"a\"\"b@example.com\",\"s,1\","));
    }

    #[test]
    fn test_empty_export_has_only_header() {
        let (store, _temp) = create_test_store();
        let mut out = Vec::new();
        let rows = LocalMirror::new(&store).export_csv(&mut out).unwrap();
        assert_eq!(rows, 0);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(export_file_name(date), "survey_timing_data_2026-10-19.csv");
    }
}
