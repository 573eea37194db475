use std::env;
use std::fs;
use std::sync::{Arc, Mutex};

use quickcheck::{quickcheck, TestResult};

use csvscan::{
    ByteRecord, CsvMode, Error, MalformedAction, QuoteStyle, Reader,
    ReaderBuilder, StringRecord, Strategy, Writer, WriterBuilder,
};

fn read_all(builder: &ReaderBuilder, data: &[u8]) -> Vec<Vec<Vec<u8>>> {
    builder
        .from_reader(data)
        .into_byte_records()
        .map(|rec| rec.unwrap().iter().map(|f| f.to_vec()).collect())
        .collect()
}

fn write_all(builder: &WriterBuilder, records: &[Vec<String>]) -> Vec<u8> {
    let mut wtr = builder.from_writer(vec![]);
    for record in records {
        wtr.write_record(record).unwrap();
    }
    wtr.into_inner().unwrap()
}

fn as_bytes(records: &[Vec<String>]) -> Vec<Vec<Vec<u8>>> {
    records
        .iter()
        .map(|rec| rec.iter().map(|f| f.as_bytes().to_vec()).collect())
        .collect()
}

#[test]
fn headers_and_records() {
    let data = "Id,Name\r\n1,one\r\n2,two\r\n";
    let mut rdr = Reader::from_reader(data.as_bytes());
    assert_eq!(rdr.headers().unwrap(), vec!["Id", "Name"]);

    let mut seen = vec![];
    while rdr.read().unwrap() {
        seen.push((
            rdr.get_field_by_name("Id").unwrap().to_string(),
            rdr.get_field(1).unwrap().to_string(),
        ));
    }
    assert_eq!(
        seen,
        vec![
            ("1".to_string(), "one".to_string()),
            ("2".to_string(), "two".to_string()),
        ]
    );
    assert!(rdr.is_done());
}

#[test]
fn quoted_delimiter() {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(&b"a,\"b,c\",d\r\n"[..]);
    let mut rec = StringRecord::new();
    assert!(rdr.read_record(&mut rec).unwrap());
    assert_eq!(rec, vec!["a", "b,c", "d"]);
    assert!(rdr.malformed_fields().is_empty());
    assert!(!rdr.read_record(&mut rec).unwrap());
}

#[test]
fn doubled_quote() {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(&b"a,\"b\"\"c\",d\r\n"[..]);
    let mut rec = StringRecord::new();
    assert!(rdr.read_record(&mut rec).unwrap());
    assert_eq!(rec, vec!["a", "b\"c", "d"]);
}

#[test]
fn stray_quote_is_observed_and_kept() {
    let seen = Arc::new(Mutex::new(vec![]));
    let seen2 = Arc::clone(&seen);
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .on_malformed(move |field| {
            seen2
                .lock()
                .unwrap()
                .push((field.position().line(), field.raw().to_vec()));
            MalformedAction::Accept
        })
        .from_reader(&b"a\"b\r\n"[..]);
    let mut rec = StringRecord::new();
    assert!(rdr.read_record(&mut rec).unwrap());
    assert_eq!(rec, vec!["a\"b"]);
    assert_eq!(*seen.lock().unwrap(), vec![(1, b"a\"b".to_vec())]);
}

#[test]
fn write_doubles_quotes() {
    let mut wtr = Writer::from_writer(vec![]);
    wtr.write_record(&["he said \"hi\""]).unwrap();
    let out = wtr.into_inner().unwrap();
    assert_eq!(out, b"\"he said \"\"hi\"\"\"\r\n");
}

#[test]
fn missing_field() {
    let mut rdr = Reader::from_reader(&b"a,b\n1,2\n"[..]);
    assert!(rdr.read().unwrap());
    match rdr.get_field(2) {
        Err(Error::MissingField { ref pos, len: 2, .. }) => {
            assert_eq!(pos.as_ref().map(|p| p.line()), Some(2));
        }
        res => panic!("unexpected result: {:?}", res),
    }
    match rdr.get_field_by_name("c") {
        Err(err @ Error::MissingField { .. }) => {
            assert!(err.to_string().contains("name \"c\""));
        }
        res => panic!("unexpected result: {:?}", res),
    }
}

#[test]
fn no_escape_mode_ignores_quotes() {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).mode(CsvMode::NoEscape);
    let got = read_all(&builder, b"\"a,b\"\r\n");
    assert_eq!(got, vec![vec![b"\"a".to_vec(), b"b\"".to_vec()]]);
}

#[test]
fn tab_delimited_escape_mode() {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).mode(CsvMode::Escape).delimiter(b"\t");
    let got = read_all(&builder, b"a\\\tb\tc\n");
    assert_eq!(got, vec![vec![b"a\tb".to_vec(), b"c".to_vec()]]);
}

#[test]
fn escape_mode_keeps_lone_empty_field() {
    let records = vec![
        vec!["a".to_string()],
        vec!["".to_string()],
        vec!["b".to_string()],
    ];
    let mut wtr = WriterBuilder::new();
    wtr.mode(CsvMode::Escape);
    let data = write_all(&wtr, &records);
    assert_eq!(data, b"a\n\nb\n");

    let mut builder = ReaderBuilder::new();
    builder.has_headers(false).mode(CsvMode::Escape);
    assert_eq!(read_all(&builder, &data), as_bytes(&records));
}

#[test]
#[should_panic(expected = "delimiter and quote share byte 0x22")]
fn delimiter_equal_to_quote_is_rejected() {
    ReaderBuilder::new().has_headers(false).delimiter(b"\"").from_reader(
        &b"a\"b\"c\n"[..],
    );
}

#[test]
#[should_panic(expected = "delimiter and record terminator")]
fn writer_rejects_delimiter_equal_to_terminator() {
    WriterBuilder::new()
        .delimiter(b";")
        .terminator(csvscan::Terminator::Any(b';'))
        .from_writer(vec![]);
}

#[test]
fn path_round_trip() {
    let path = env::temp_dir()
        .join(format!("csvscan-path-round-trip-{}.csv", std::process::id()));
    {
        let mut wtr = Writer::from_path(&path).unwrap();
        wtr.write_record(&["city", "pop"]).unwrap();
        wtr.write_record(&["Boston, MA", "4628910"]).unwrap();
        wtr.flush().unwrap();
    }
    let records: Vec<StringRecord> = Reader::from_path(&path)
        .unwrap()
        .into_records()
        .collect::<Result<_, _>>()
        .unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(records, vec![vec!["Boston, MA", "4628910"]]);
}

#[test]
fn byte_records_keep_positions() {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(&b"a\n\"b\nc\"\nd\n"[..]);
    let mut rec = ByteRecord::new();
    let mut lines = vec![];
    while rdr.read_byte_record(&mut rec).unwrap() {
        lines.push(rec.position().unwrap().line());
    }
    assert_eq!(lines, vec![1, 2, 4]);
}

#[cfg(feature = "serde")]
#[test]
fn configuration_types_serialize() {
    assert_eq!(serde_json::to_string(&CsvMode::Escape).unwrap(), "\"Escape\"");
    let style: QuoteStyle = serde_json::from_str("\"Always\"").unwrap();
    assert_eq!(style, QuoteStyle::Always);
    let strategy: Strategy = serde_json::from_str("\"Swar\"").unwrap();
    assert_eq!(strategy, Strategy::Swar);
}

#[test]
fn round_trip_rfc4180() {
    fn prop(records: Vec<Vec<String>>) -> TestResult {
        if records.iter().any(|rec| rec.is_empty()) {
            return TestResult::discard();
        }
        let data = write_all(&WriterBuilder::new(), &records);
        let mut builder = ReaderBuilder::new();
        builder.has_headers(false);
        TestResult::from_bool(read_all(&builder, &data) == as_bytes(&records))
    }
    quickcheck(prop as fn(Vec<Vec<String>>) -> TestResult);
}

#[test]
fn round_trip_escape() {
    fn prop(records: Vec<Vec<String>>) -> TestResult {
        if records.iter().any(|rec| rec.is_empty()) {
            return TestResult::discard();
        }
        let mut wtr = WriterBuilder::new();
        wtr.mode(CsvMode::Escape);
        let data = write_all(&wtr, &records);
        let mut builder = ReaderBuilder::new();
        builder.has_headers(false).mode(CsvMode::Escape);
        TestResult::from_bool(read_all(&builder, &data) == as_bytes(&records))
    }
    quickcheck(prop as fn(Vec<Vec<String>>) -> TestResult);
}

#[test]
fn plain_fields_are_written_as_is() {
    fn prop(record: Vec<String>) -> TestResult {
        let record: Vec<String> = record
            .into_iter()
            .map(|f| f.chars().filter(|c| !",\"\r\n".contains(*c)).collect())
            .collect();
        if record.is_empty() || (record.len() == 1 && record[0].is_empty()) {
            return TestResult::discard();
        }
        let data = write_all(&WriterBuilder::new(), &[record.clone()]);
        let expected = format!("{}\r\n", record.join(","));
        TestResult::from_bool(data == expected.as_bytes())
    }
    quickcheck(prop as fn(Vec<String>) -> TestResult);
}

#[test]
fn strategies_agree() {
    fn prop(data: Vec<u8>, mode: u8) -> bool {
        let mode = match mode % 3 {
            0 => CsvMode::Rfc4180,
            1 => CsvMode::Escape,
            _ => CsvMode::NoEscape,
        };
        let parse = |strategy| {
            let mut builder = ReaderBuilder::new();
            builder
                .has_headers(false)
                .mode(mode)
                .strategy(strategy)
                .buffer_capacity(7);
            read_all(&builder, &data)
        };
        let expected = parse(Strategy::Scalar);
        [Strategy::Swar, Strategy::Sse2, Strategy::Avx2, Strategy::Auto]
            .iter()
            .all(|&strategy| parse(strategy) == expected)
    }
    quickcheck(prop as fn(Vec<u8>, u8) -> bool);
}
