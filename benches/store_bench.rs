//! Benchmarks for the NovellaHub local store
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use novellahub::storage::*;
use std::sync::Arc;
use tempfile::tempdir;

fn populated_document(posts: usize) -> Document {
    let mut doc = Document::default();
    for i in 0..posts {
        doc.posts.push(Post {
            id: i.to_string(),
            author: GUEST_AUTHOR.to_string(),
            author_name: GUEST_NAME.to_string(),
            title: format!("Post {}", i),
            content: "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(8),
            kind: PostKind::Novel,
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        });
    }
    doc
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for size in [10, 100, 1000] {
        let store = LocalStore::in_memory();
        store.save(&mut populated_document(size)).unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("memory_{}_posts", size), |b| {
            b.iter(|| black_box(store.load().unwrap()))
        });
    }

    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    group.bench_function("memory_append_message", |b| {
        let store = LocalStore::in_memory();
        store.save(&mut populated_document(100)).unwrap();

        b.iter(|| {
            store
                .update(|doc| {
                    let room = doc.room_mut(SEED_ROOM_ID).unwrap();
                    room.messages.push(Message {
                        id: room.messages.len().to_string(),
                        author: GUEST_AUTHOR.to_string(),
                        author_name: GUEST_NAME.to_string(),
                        text: black_box("hello").to_string(),
                        created_at: "2024-01-01T00:00:00.000Z".to_string(),
                        reported: false,
                    });
                    Ok::<_, StoreError>(())
                })
                .unwrap()
        });
    });

    group.bench_function("file_publish_post", |b| {
        let dir = tempdir().unwrap();
        let backend: Arc<dyn KeyValueBackend> = Arc::new(FileBackend::open(dir.path()).unwrap());
        let store = LocalStore::new(backend, StoreConfig::default());
        store.save(&mut populated_document(100)).unwrap();

        b.iter(|| {
            store
                .update(|doc| {
                    let mut post = doc.posts[0].clone();
                    post.id = doc.posts.len().to_string();
                    doc.posts.insert(0, post);
                    doc.posts.truncate(100);
                    Ok::<_, StoreError>(())
                })
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_load, bench_update);
criterion_main!(benches);
