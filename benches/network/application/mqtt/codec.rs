use criterion::{Criterion, Throughput};
use std::hint::black_box;
use mqttlink::network::application::mqtt::{Inbound, QoS, codec};
use mqttlink::queue::FramedQueue;

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_publish");
    let payload = [0x5Au8; 256];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("encode_publish", |b| {
        let mut buf = [0u8; 512];
        let mut next_id = 0;
        b.iter(|| {
            let (packet, _) = codec::encode_publish(
                &mut buf,
                black_box("mqttlink/bench-topic"),
                black_box(&payload),
                QoS::AtLeastOnce,
                false,
                &mut next_id,
            )
            .expect("Failed to encode");
            black_box(packet.len());
        })
    });
    group.finish();
}

pub fn bench_parse_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_publish");
    let mut buf = [0u8; 512];
    let mut next_id = 0;
    let (packet, _) = codec::encode_publish(
        &mut buf,
        "mqttlink/bench-topic",
        &[0x5A; 256],
        QoS::AtLeastOnce,
        false,
        &mut next_id,
    )
    .expect("Failed to encode");
    group.throughput(Throughput::Bytes(packet.len() as u64));
    group.bench_function("parse_publish", |b| {
        b.iter(|| {
            let inbound = Inbound::parse(black_box(packet)).expect("Failed to parse");
            black_box(inbound);
        })
    });
    group.finish();
}

pub fn bench_queue_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_round_trip");
    // Every third byte needs escaping.
    let payload: Vec<u8> = (0..300u32).map(|i| [0x30, 0x7E, 0x41][i as usize % 3]).collect();
    group.throughput(Throughput::Bytes(payload.len() as u64 * 4));
    group.bench_function("queue_round_trip", |b| {
        let mut queue: FramedQueue<2048> = FramedQueue::new();
        let mut out = [0u8; 512];
        b.iter(|| {
            for _ in 0..4 {
                queue.enqueue(black_box(&payload)).expect("Failed to enqueue");
            }
            while let Ok(len) = queue.dequeue(&mut out) {
                black_box(len);
            }
        })
    });
    group.finish();
}
