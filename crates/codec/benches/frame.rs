use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use wsgate_server_codec::{
    frame::{FrameHeader, MessageType, apply_mask, encode_header},
    utf8::Utf8State,
};

fn criterion_benchmark(c: &mut Criterion) {
    let mut frame_criterion = c.benchmark_group("frame");

    frame_criterion.throughput(Throughput::Elements(1));
    frame_criterion.bench_function("encode_header", |bencher| {
        let mut length = 0u64;
        bencher.iter(|| {
            length = (length + 977) & 0x1_ffff;
            encode_header(MessageType::Binary, length)
        })
    });

    let masked = [0x82u8, 0xfe, 0x04, 0x00, 0x11, 0x22, 0x33, 0x44];
    frame_criterion.bench_function("decode_header", |bencher| {
        bencher.iter(|| FrameHeader::decode(&masked).unwrap())
    });

    let mut payload = vec![0x5au8; 4096];
    frame_criterion.throughput(Throughput::Bytes(payload.len() as u64));
    frame_criterion.bench_function("apply_mask_4k", |bencher| {
        bencher.iter(|| apply_mask(&mut payload, [0x11, 0x22, 0x33, 0x44], 0))
    });

    let text = "価格は€100、絵文字は😀です。".repeat(64);
    frame_criterion.throughput(Throughput::Bytes(text.len() as u64));
    frame_criterion.bench_function("validate_utf8", |bencher| {
        bencher.iter(|| {
            let mut state = Utf8State::VALID;
            for &byte in text.as_bytes() {
                state = state.advance(byte);
            }
            state
        })
    });

    frame_criterion.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
