use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use aliasalloc::diagnostics::suppress_diagnostics;
use aliasalloc::heap::dummy::{DummyAliasedHeap, DummyDevice};
use aliasalloc::{
    AliasedAttachmentAllocator, AllocatorDescriptor, AttachmentId, BufferDescriptor, CompileFlags,
    Device, HeapAllocationStrategy, PagingParameters, ScopeId, TransientBufferDescriptor,
};

const MB: u64 = 1024 * 1024;

type Allocator = AliasedAttachmentAllocator<DummyAliasedHeap>;

fn allocator(page_size: u64) -> Allocator {
    let device: Arc<dyn Device> = Arc::new(DummyDevice::default());
    let descriptor = AllocatorDescriptor::new("BenchPool").with_strategy(
        HeapAllocationStrategy::Paging(PagingParameters {
            page_size_in_bytes: page_size,
            initial_allocation_percentage: 0.0,
            ..Default::default()
        }),
    );
    Allocator::init(device, descriptor).unwrap()
}

fn bench_activation_cycle(c: &mut Criterion) {
    suppress_diagnostics(true);

    let mut group = c.benchmark_group("activation_cycle");
    for attachment_count in [8usize, 64, 256] {
        let ids: Vec<AttachmentId> = (0..attachment_count)
            .map(|i| AttachmentId::new(&format!("attachment_{}", i)))
            .collect();
        let descriptors: Vec<TransientBufferDescriptor> = ids
            .iter()
            .map(|id| TransientBufferDescriptor {
                attachment_id: id.clone(),
                buffer: BufferDescriptor { byte_count: MB / 4 },
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(attachment_count),
            &attachment_count,
            |b, _| {
                let mut allocator = allocator(64 * MB);
                let scope = ScopeId::from("bench_pass");
                b.iter(|| {
                    allocator.begin(CompileFlags::NONE, 0);
                    for descriptor in &descriptors {
                        std::hint::black_box(allocator.activate_buffer(descriptor, &scope));
                    }
                    for id in &ids {
                        allocator.deactivate_buffer(id, &scope);
                    }
                    allocator.end();
                    allocator.on_frame_end();
                });
            },
        );
    }
    group.finish();
}

fn bench_measurement_cycle(c: &mut Criterion) {
    suppress_diagnostics(true);

    let ids: Vec<AttachmentId> = (0..64)
        .map(|i| AttachmentId::new(&format!("measured_{}", i)))
        .collect();
    let descriptors: Vec<TransientBufferDescriptor> = ids
        .iter()
        .map(|id| TransientBufferDescriptor {
            attachment_id: id.clone(),
            buffer: BufferDescriptor { byte_count: MB / 4 },
        })
        .collect();

    c.bench_function("measurement_cycle", |b| {
        let mut allocator = allocator(64 * MB);
        let scope = ScopeId::from("bench_pass");
        b.iter(|| {
            allocator.begin(CompileFlags::DONT_ALLOCATE_RESOURCES, 0);
            for descriptor in &descriptors {
                std::hint::black_box(allocator.activate_buffer(descriptor, &scope));
            }
            for id in &ids {
                allocator.deactivate_buffer(id, &scope);
            }
            allocator.end();
        });
    });
}

criterion_group!(benches, bench_activation_cycle, bench_measurement_cycle);
criterion_main!(benches);
