//! Resolution and instance lookup throughput for catalogs of increasing size.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sprout_core::{Bean, Container, Instance, TypeCatalog, TypeMetadata, TypeRef};

struct Service;

impl Bean for Service {}

/// `count` concrete services, each behind its own interface
fn build_catalog(count: usize, service_marker: bool) -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    for i in 0..count {
        let interface = format!("Api{}", i);
        let implementation = format!("Service{}", i);
        catalog.register(
            TypeRef::interface(interface.clone()),
            TypeMetadata::new().auto_implement_name(implementation.clone()),
        );
        let mut metadata = TypeMetadata::new().extends(interface);
        if service_marker {
            metadata = metadata.service();
        }
        catalog.register(
            TypeRef::concrete(implementation, |_| Ok(Instance::new(Service))),
            metadata,
        );
    }
    catalog
}

fn container(count: usize, service_marker: bool) -> Container {
    Container::builder()
        .with_metadata(Arc::new(build_catalog(count, service_marker)))
        .build()
        .expect("container builds")
}

/// Cold resolution: every definition is synthesized through the full chain
fn benchmark_cold_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_resolution");

    for count in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("interfaces", count), count, |b, &size| {
            b.iter(|| {
                let container = container(size, false);
                for i in 0..size {
                    black_box(container.resolve(&format!("Api{}", i)));
                }
            });
        });
    }

    group.finish();
}

/// Warm singleton lookups through delegating definitions
fn benchmark_singleton_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("singleton_lookup");

    for proxied in [false, true] {
        let container = container(100, proxied);
        for i in 0..100 {
            container
                .get_instance(format!("Api{}", i), &[])
                .expect("instance resolves");
        }
        let label = if proxied { "proxied" } else { "plain" };
        group.bench_function(label, |b| {
            b.iter(|| black_box(container.get_instance("Api42", &[]).expect("instance resolves")));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_cold_resolution, benchmark_singleton_lookup);
criterion_main!(benches);
