use std::hint::black_box;

use binexp::{Regex, RegexOptions};
use criterion::{criterion_group, criterion_main, Criterion};

fn blob() -> Vec<u8> {
    // pseudo-random bytes with a few planted call/ret sequences
    let mut state = 0x2545_f491u32;
    let mut blob: Vec<u8> = (0..64 * 1024)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect();
    for at in [1000, 20_000, 50_000] {
        blob[at..at + 6].copy_from_slice(b"\xe8\x10\x00\x00\x00\xc3");
    }
    blob
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let blob = blob();
    {
        let re = Regex::new(b"\xe8[\x00-\xff]{4}\xc3", RegexOptions::BYTE_RUNES).unwrap();
        assert!(re.find_bytes_iter(&blob).count() >= 3);
        c.bench_function("bytes/call_ret", |b| {
            b.iter(|| re.find_bytes_iter(black_box(&blob)).count())
        });
    }
    {
        let re = Regex::new(b"[\xca\xcb][\x00-\x7f]+\xcc", RegexOptions::BYTE_RUNES).unwrap();
        c.bench_function("bytes/class_run", |b| {
            b.iter(|| re.find_bytes_iter(black_box(&blob)).count())
        });
    }
    {
        let text = "lorem ipsum dolor sit amet ".repeat(2000) + "Needle";
        let re = Regex::new("needle", RegexOptions::IGNORE_CASE).unwrap();
        assert!(re.is_match_text(&text).unwrap());
        c.bench_function("text/ignore_case_literal", |b| {
            b.iter(|| re.is_match_text(black_box(&text)).unwrap())
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
