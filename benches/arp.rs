//! Benchmarks for ARP frame construction and parsing.

use criterion::{Criterion, criterion_group, criterion_main};
use pnet::util::MacAddr;
use std::hint::black_box;
use std::net::Ipv4Addr;

use diamond::network::arp;

const ATTACKER: MacAddr = MacAddr(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff);
const GATEWAY_MAC: MacAddr = MacAddr(0x00, 0x11, 0x22, 0x33, 0x44, 0x55);
const GATEWAY_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
const TARGET_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
const TARGET_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0x0a);

fn bench_frame_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("arp_building");

    group.bench_function("spoof_reply", |b| {
        b.iter(|| {
            arp::build_spoof_reply(
                black_box(ATTACKER),
                black_box(GATEWAY_IP),
                black_box(TARGET_IP),
                black_box(TARGET_MAC),
            )
        });
    });

    group.bench_function("restore_reply", |b| {
        b.iter(|| {
            arp::build_restore_reply(
                black_box(GATEWAY_MAC),
                black_box(GATEWAY_IP),
                black_box(TARGET_IP),
                black_box(TARGET_MAC),
            )
        });
    });

    group.bench_function("request", |b| {
        b.iter(|| arp::build_arp_request(black_box(TARGET_IP), black_box(ATTACKER), black_box(GATEWAY_IP)));
    });

    group.finish();
}

fn bench_frame_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("arp_parsing");

    let frame = arp::build_spoof_reply(ATTACKER, GATEWAY_IP, TARGET_IP, TARGET_MAC).unwrap();
    group.bench_function("reply", |b| {
        b.iter(|| arp::parse_arp_packet(black_box(&frame)));
    });

    let garbage = vec![0u8; arp::ARP_FRAME_SIZE];
    group.bench_function("not_arp", |b| {
        b.iter(|| arp::parse_arp_packet(black_box(&garbage)));
    });

    group.finish();
}

criterion_group!(benches, bench_frame_building, bench_frame_parsing);
criterion_main!(benches);
