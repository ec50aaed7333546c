//! Criterion benchmarks for the serial redirection wire layouts.
//!
//! Measures PDU header decoding plus per-operation input decoding, which sits
//! on the hot path of every request a device worker handles.
//!
//! Run with:
//! ```bash
//! cargo bench --package serial-redir-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serial_redir_core::protocol::ioctl::IOCTL_SERIAL_GET_MODEMSTATUS;
use serial_redir_core::protocol::pdu::{decode_io_request, encode_io_completion, IoRequestHeader};
use serial_redir_core::protocol::wire::{
    encode_read_response, CreateRequest, DeviceControlRequest, MajorFunction, ReadRequest,
    WriteRequest,
};
use serial_redir_core::NtStatus;

// ── Request fixtures ──────────────────────────────────────────────────────────

fn make_pdu(major: MajorFunction, input: Vec<u8>) -> Vec<u8> {
    IoRequestHeader {
        device_id: 1,
        file_id: 1,
        completion_id: 42,
        major_function: major as u32,
        minor_function: 0,
    }
    .encode_with_input(&input)
}

fn fixtures() -> Vec<(&'static str, Vec<u8>)> {
    let payload = vec![0x55u8; 512];
    vec![
        ("Create", make_pdu(MajorFunction::Create, CreateRequest::default().encode())),
        (
            "Read",
            make_pdu(
                MajorFunction::Read,
                ReadRequest { length: 512, offset: 0 }.encode(),
            ),
        ),
        (
            "Write_512",
            make_pdu(
                MajorFunction::Write,
                WriteRequest { length: 512, offset: 0, data: &payload }.encode(),
            ),
        ),
        (
            "DeviceControl",
            make_pdu(
                MajorFunction::DeviceControl,
                DeviceControlRequest {
                    output_buffer_length: 4,
                    input_buffer_length: 0,
                    io_control_code: IOCTL_SERIAL_GET_MODEMSTATUS,
                    input: &[],
                }
                .encode(),
            ),
        ),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

fn bench_decode_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_request");
    for (name, bytes) in &fixtures() {
        group.bench_with_input(BenchmarkId::new("op", name), bytes, |b, bytes| {
            b.iter(|| {
                let (header, input) = decode_io_request(black_box(bytes)).unwrap();
                match MajorFunction::try_from(header.major_function).unwrap() {
                    MajorFunction::Create => {
                        black_box(CreateRequest::decode(input).unwrap());
                    }
                    MajorFunction::Read => {
                        black_box(ReadRequest::decode(input).unwrap());
                    }
                    MajorFunction::Write => {
                        black_box(WriteRequest::decode(input).unwrap());
                    }
                    MajorFunction::DeviceControl => {
                        black_box(DeviceControlRequest::decode(input).unwrap());
                    }
                    MajorFunction::Close => {}
                }
            })
        });
    }
    group.finish();
}

fn bench_encode_read_completion(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_read_completion");
    for size in [0usize, 64, 4096] {
        let data = vec![0xA5u8; size];
        group.bench_with_input(BenchmarkId::new("bytes", size), &data, |b, data| {
            b.iter(|| {
                let mut output = Vec::with_capacity(4 + data.len());
                encode_read_response(&mut output, black_box(data));
                black_box(encode_io_completion(1, 42, NtStatus::Success, &output))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode_request, bench_encode_read_completion);
criterion_main!(benches);
