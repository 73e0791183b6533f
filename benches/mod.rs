use criterion::{criterion_group, criterion_main};

mod network {
    pub mod application {
        pub mod mqtt {
            pub mod codec;
            pub mod connection;
        }
    }
}

criterion_group!(
    benches,
    network::application::mqtt::codec::bench_encode_publish,
    network::application::mqtt::codec::bench_parse_publish,
    network::application::mqtt::codec::bench_queue_round_trip,
    network::application::mqtt::connection::bench_publish_and_tick_qos0,
    network::application::mqtt::connection::bench_publish_and_ack_qos1
);
criterion_main!(benches);
