// Copyright 2026 Nagashi Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Snapshot Write Benchmarks
//!
//! Measures writing one table snapshot:
//! - Pretty vs compact JSON
//! - Table size
//! - A full flush through the in-memory destination
//!
//! fsync is disabled so the numbers reflect encoding and rename cost, not the disk.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench --package nagashi-benches --bench snapshot_write
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nagashi_benches::{insert_events, user_registry};
use nagashi_core::destination::SnapshotDestination;
use nagashi_core::normalize::EventNormalizer;
use nagashi_core::snapshot::{flush, FlushScope};
use nagashi_core::{MockDestination, TableStateStore};
use nagashi_destinations::file::{FileDestinationConfig, FileSnapshotDestination};

fn populated_store(rows: usize) -> TableStateStore {
    let registry = user_registry();
    let normalizer = EventNormalizer::default();
    let mut store = TableStateStore::new();
    for event in insert_events(rows) {
        for mutation in normalizer.normalize(&registry, event).mutations {
            store.apply(mutation);
        }
    }
    store
}

/// Benchmark: file snapshot of one table, pretty and compact
fn bench_file_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_write");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();

    for rows in [100, 1_000, 10_000] {
        let store = populated_store(rows);
        let records = store.snapshot_view("users").unwrap();
        group.throughput(Throughput::Elements(rows as u64));

        for pretty in [true, false] {
            let config = FileDestinationConfig::builder()
                .output_dir(dir.path())
                .pretty(pretty)
                .fsync(false)
                .build()
                .unwrap();
            let mut destination = rt.block_on(FileSnapshotDestination::new(config)).unwrap();
            let name = if pretty { "pretty" } else { "compact" };

            group.bench_with_input(BenchmarkId::new(name, rows), &records, |b, records| {
                b.iter(|| {
                    black_box(rt.block_on(destination.write_table("users", records)).unwrap())
                });
            });

            rt.block_on(destination.close()).unwrap();
        }
    }

    group.finish();
}

/// Benchmark: full flush of a store into the in-memory destination
fn bench_flush_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush_all");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for rows in [1_000, 10_000] {
        let mut store = populated_store(rows);
        let mut destination = MockDestination::new();
        group.throughput(Throughput::Elements(rows as u64));

        group.bench_function(BenchmarkId::from_parameter(rows), |b| {
            b.iter(|| {
                black_box(rt.block_on(flush(&mut store, &mut destination, FlushScope::All)));
                destination.reset();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_file_write, bench_flush_all);
criterion_main!(benches);
