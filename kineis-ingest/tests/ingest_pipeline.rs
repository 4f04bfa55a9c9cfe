// Ingestion of received messages into archive and table sinks
use chrono::{TimeZone, Utc};
use kineis_ingest::{
    AppConfig, DirectoryArchive, IngestHandler, JsonlTelemetryTable, MemoryArchive,
    MemoryTelemetryTable, RawArchive, SinkError, TelemetryRecord, TelemetryTable,
};
use std::sync::Arc;

const VALID_RAW: &str = "005DE952A37EE80186A0387C37397C31302E33324300376461746366030185";
const NOISE_RAW: &str = "570783878F0F01F0F0F0F2F1E1E18F1E31F1CE8C387DC0A1F03970F8F1C58A";
const CSV_RAW: &str = "F76AC36EE80186A0387C31387C32302E323443000000000000";

fn config() -> AppConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    AppConfig::from_toml_str(
        r#"
        [decoder.timestamp_offsets]
        day_bit = 22
        hour_bit = 27
        minute_bit = 32
        "#,
    )
    .unwrap()
}

fn memory_handler() -> (IngestHandler, Arc<MemoryTelemetryTable>, Arc<MemoryArchive>) {
    let table = Arc::new(MemoryTelemetryTable::new());
    let archive = Arc::new(MemoryArchive::new());
    let handler = IngestHandler::new(&config(), table.clone(), archive.clone());
    (handler, table, archive)
}

fn json_message(raw_payloads: &[&str]) -> String {
    let entries: Vec<String> = raw_payloads
        .iter()
        .enumerate()
        .map(|(i, raw)| format!(r#"{{"DEVICE_ID":"2058{}","MSG_ID":{},"RAW_DATA":"{}"}}"#, i, i, raw))
        .collect();
    format!(
        r#"{{"TYPE":"DEVICE_RAW","MODE":"BASIC","VERSION":1,"DATA":[{}]}}"#,
        entries.join(",")
    )
}

#[test]
fn valid_reading_is_written_to_table() {
    let (handler, table, archive) = memory_handler();
    let message = json_message(&[VALID_RAW]);

    let report = handler.process_message(message.as_bytes(), Some("205895")).unwrap();

    assert_eq!(report.entries, 1);
    assert_eq!(report.valid, 1);
    assert_eq!(report.written, 1);
    assert_eq!(
        table.records(),
        vec![TelemetryRecord {
            partition_key: "Temperature3e".to_string(),
            row_key: "79".to_string(),
            message: "10.32".to_string(),
        }]
    );
    assert_eq!(archive.get(&report.archive_name).unwrap(), message.into_bytes());
}

#[test]
fn invalid_and_malformed_entries_do_not_fail_message() {
    let (handler, table, _archive) = memory_handler();
    let message = json_message(&["ABC", NOISE_RAW, VALID_RAW]);

    let report = handler.process_message(message.as_bytes(), None).unwrap();

    assert_eq!(report.entries, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.decoded, 2);
    assert_eq!(report.valid, 1);
    assert_eq!(report.written, 1);
    assert_eq!(table.len(), 1);
}

#[test]
fn duplicate_row_keys_are_tolerated_first_wins() {
    let (handler, table, _archive) = memory_handler();
    // Same frame relayed twice, then a second message with it again
    let message = json_message(&[VALID_RAW, VALID_RAW]);

    let report = handler.process_message(message.as_bytes(), None).unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(report.conflicts, 1);

    let report = handler.process_message(message.as_bytes(), None).unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(report.conflicts, 2);
    assert_eq!(table.len(), 1);
}

#[test]
fn csv_message_is_ingested() {
    let (handler, table, archive) = memory_handler();
    let message = format!(
        "DEVICE_ID;MSG_ID;CHECKED;GPS_DATE;CRC_OK;BCH_STATUS;LONG;LAT;ALT;SENSORS;METADATAS;COUNTER\n\
         205895;2095769;true;2022-02-23T16:48:12.504Z;true;;;;;\"{{\"\"RAW_DATA\"\":\"\"{}\"\"}}\";;\n",
        CSV_RAW
    );

    let arrival = Utc.with_ymd_and_hms(2022, 2, 23, 16, 48, 20).unwrap();
    let report = handler
        .process_message_at(message.as_bytes(), Some("205895"), arrival)
        .unwrap();

    assert!(report.archive_name.starts_with("kineis/2022-02-23T16-48-20Z-"));
    assert_eq!(report.written, 1);
    assert_eq!(table.records()[0].row_key, "18");
    assert_eq!(table.records()[0].message, "20.24");
    assert_eq!(archive.names().len(), 1);
}

#[test]
fn unparsable_envelope_fails_after_archiving() {
    let (handler, table, archive) = memory_handler();

    let result = handler.process_message(b"{ not json", None);

    assert!(result.is_err());
    assert!(table.is_empty());
    let names = archive.names();
    assert_eq!(names.len(), 1);
    assert_eq!(archive.get(&names[0]).unwrap(), b"{ not json".to_vec());
}

struct FailingArchive;

impl RawArchive for FailingArchive {
    fn store(&self, _name: &str, _contents: &[u8]) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("archive offline".to_string()))
    }
}

#[test]
fn archive_failure_fails_message() {
    let table = Arc::new(MemoryTelemetryTable::new());
    let handler = IngestHandler::new(&config(), table.clone(), Arc::new(FailingArchive));

    let message = json_message(&[VALID_RAW]);
    assert!(handler.process_message(message.as_bytes(), None).is_err());
    assert!(table.is_empty());
}

struct FlakyTable;

impl TelemetryTable for FlakyTable {
    fn insert(&self, _record: TelemetryRecord) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("table offline".to_string()))
    }
}

#[test]
fn table_errors_are_counted_not_fatal() {
    let handler = IngestHandler::new(&config(), Arc::new(FlakyTable), Arc::new(MemoryArchive::new()));

    let message = json_message(&[VALID_RAW]);
    let report = handler.process_message(message.as_bytes(), None).unwrap();
    assert_eq!(report.valid, 1);
    assert_eq!(report.written, 0);
    assert_eq!(report.sink_errors, 1);
}

#[test]
fn filesystem_sinks_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(DirectoryArchive::new(dir.path().join("blobs")));
    let table = Arc::new(JsonlTelemetryTable::open(dir.path().join("readings.jsonl")).unwrap());
    let handler = IngestHandler::new(&config(), table.clone(), archive);

    let message = json_message(&[VALID_RAW, NOISE_RAW]);
    let report = handler.process_message(message.as_bytes(), None).unwrap();

    let archived = std::fs::read(dir.path().join("blobs").join(&report.archive_name)).unwrap();
    assert_eq!(archived, message.as_bytes());

    let records = table.read_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].row_key, "79");
}
