#![feature(test)]

extern crate test;

use test::Bencher;

use csvscan_core::{
    Dialect, Locate, Locator, Parser, ParserBuilder, ReadRecordResult,
    Strategy, WINDOW,
};

fn sample(rows: usize) -> Vec<u8> {
    let mut data = vec![];
    for i in 0..rows {
        data.extend_from_slice(
            format!("{},\"name {}\",{}.25,some longer text here\r\n", i, i, i)
                .as_bytes(),
        );
    }
    data
}

macro_rules! bench_locate {
    ($name:ident, $strategy:expr) => {
        #[bench]
        fn $name(b: &mut Bencher) {
            let data = sample(2000);
            let locator =
                Locator::new(Dialect::default().specials(), $strategy);
            b.bytes = data.len() as u64;
            b.iter(|| {
                let mut count = 0;
                for window in data.chunks(WINDOW) {
                    count += locator.locate(window).count_ones();
                }
                count
            })
        }
    };
}

bench_locate!(locate_scalar, Strategy::Scalar);
bench_locate!(locate_swar, Strategy::Swar);
bench_locate!(locate_sse2, Strategy::Sse2);
bench_locate!(locate_avx2, Strategy::Avx2);

macro_rules! bench_parse {
    ($name:ident, $strategy:expr) => {
        #[bench]
        fn $name(b: &mut Bencher) {
            let data = sample(2000);
            let mut parser = ParserBuilder::new().strategy($strategy).build();
            b.bytes = data.len() as u64;
            b.iter(|| {
                parser.reset();
                assert_eq!(count_records(&mut parser, &data), 2000);
            })
        }
    };
}

bench_parse!(count_records_scalar, Strategy::Scalar);
bench_parse!(count_records_swar, Strategy::Swar);
bench_parse!(count_records_auto, Strategy::Auto);

fn count_records(parser: &mut Parser, mut data: &[u8]) -> u64 {
    let (mut fields, mut ends) = (vec![], vec![]);
    let mut count = 0;
    loop {
        match parser.read_record(&mut fields, &mut ends).unwrap() {
            ReadRecordResult::InputEmpty => {
                let spare = parser.spare().unwrap();
                let n = spare.len().min(data.len());
                spare[..n].copy_from_slice(&data[..n]);
                data = &data[n..];
                parser.commit(n);
            }
            ReadRecordResult::Record => count += 1,
            ReadRecordResult::End => return count,
        }
    }
}
