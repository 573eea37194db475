#![feature(test)]

extern crate test;

use std::io;

use test::Bencher;

use csvscan::{
    ByteRecord, CsvMode, Reader, ReaderBuilder, StringRecord, Strategy,
    WriterBuilder,
};

/// Short unquoted fields, like most numeric exports.
fn plain(rows: usize) -> String {
    let mut data = String::from("id,name,score,city\n");
    for i in 0..rows {
        data.push_str(&format!("{},player{},{}.5,Boston\n", i, i, i % 100));
    }
    data
}

/// Long quoted fields with embedded delimiters, quotes and newlines.
fn quoted(rows: usize) -> String {
    let mut data = String::from("id,comment\r\n");
    for i in 0..rows {
        data.push_str(&format!(
            "{},\"said \"\"hello\"\", then left, {}\r\nand came back later \
             with a much longer remark about nothing in particular\"\r\n",
            i, i
        ));
    }
    data
}

/// Backslash escaped fields.
fn escaped(rows: usize) -> String {
    let mut data = String::from("id\tpath\n");
    for i in 0..rows {
        data.push_str(&format!("{}\tC:\\\\data\\\\file{}.txt\n", i, i));
    }
    data
}

macro_rules! bench {
    ($name:ident, $data:expr, $config:expr, $counter:ident, $result:expr) => {
        #[bench]
        fn $name(b: &mut Bencher) {
            let data = $data;
            let data = data.as_bytes();
            let mut builder = ReaderBuilder::new();
            $config(&mut builder);
            b.bytes = data.len() as u64;
            b.iter(|| {
                let mut rdr = builder.from_reader(data);
                assert_eq!($counter(&mut rdr), $result);
            })
        }
    };
}

fn auto(_: &mut ReaderBuilder) {}

fn scalar(b: &mut ReaderBuilder) {
    b.strategy(Strategy::Scalar);
}

fn swar(b: &mut ReaderBuilder) {
    b.strategy(Strategy::Swar);
}

fn escape(b: &mut ReaderBuilder) {
    b.mode(CsvMode::Escape).delimiter(b"\t");
}

bench!(count_plain_bytes, plain(10000), auto, count_bytes, 10000);
bench!(count_plain_str, plain(10000), auto, count_str, 10000);
bench!(count_plain_bytes_scalar, plain(10000), scalar, count_bytes, 10000);
bench!(count_plain_bytes_swar, plain(10000), swar, count_bytes, 10000);
bench!(count_quoted_bytes, quoted(5000), auto, count_bytes, 5000);
bench!(count_quoted_str, quoted(5000), auto, count_str, 5000);
bench!(count_quoted_bytes_scalar, quoted(5000), scalar, count_bytes, 5000);
bench!(count_escaped_bytes, escaped(10000), escape, count_bytes, 10000);

#[bench]
fn write_quoted(b: &mut Bencher) {
    let data = quoted(1000);
    let records: Vec<ByteRecord> = ReaderBuilder::new()
        .from_reader(data.as_bytes())
        .into_byte_records()
        .collect::<Result<_, _>>()
        .unwrap();
    b.iter(|| {
        let mut wtr = WriterBuilder::new().from_writer(io::sink());
        for record in &records {
            wtr.write_byte_record(record).unwrap();
        }
        wtr.flush().unwrap();
    })
}

fn count_bytes<R: io::Read>(rdr: &mut Reader<R>) -> u64 {
    let mut count = 0;
    let mut rec = ByteRecord::new();
    while rdr.read_byte_record(&mut rec).unwrap() {
        count += 1;
    }
    count
}

fn count_str<R: io::Read>(rdr: &mut Reader<R>) -> u64 {
    let mut count = 0;
    let mut rec = StringRecord::new();
    while rdr.read_record(&mut rec).unwrap() {
        count += 1;
    }
    count
}
