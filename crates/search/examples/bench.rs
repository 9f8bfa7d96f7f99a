//! Rough timing for proxy passes over a large layer list.
//! Run with `cargo run -p wrangler-search --example bench --release -- 200000`.

use std::time::Instant;

use wrangler_core::{Layer, ObjectId, TaskStateTotals};
use wrangler_search::{SortFilterProxy, SortOrder};

fn id(n: u64) -> ObjectId {
    let mut b = [0u8; 16];
    b[0..8].copy_from_slice(&n.to_le_bytes());
    ObjectId::from_bytes(b)
}

fn gen_layer(i: usize) -> Layer {
    let kind = match i % 3 {
        0 => "beauty",
        1 => "shadow",
        _ => "comp",
    };
    Layer {
        id: id(i as u64),
        name: format!("shot_{}_{}_v{}", i / 100, kind, i % 17),
        service: "maya".to_string(),
        totals: TaskStateTotals { waiting: (i % 7) as u32, running: (i % 5) as u32, dead: (i % 11) as u32, ..Default::default() },
        ..Default::default()
    }
}

fn main() {
    let n: usize = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(100_000);
    let rows: Vec<Layer> = (0..n).map(gen_layer).collect();
    let mut proxy = SortFilterProxy::new();

    let t0 = Instant::now();
    proxy.sort_by_column(0, SortOrder::Ascending);
    proxy.invalidate(&rows);
    println!("sort by name: {} rows in {:?}", proxy.row_count(), t0.elapsed());

    let t1 = Instant::now();
    proxy.sort_by_column(7, SortOrder::Descending);
    proxy.invalidate(&rows);
    println!("sort by dead: {} rows in {:?}", proxy.row_count(), t1.elapsed());

    for q in ["comp", "shot_1 beauty", "v1 shadow", "nomatch"] {
        let t = Instant::now();
        if let Err(e) = proxy.set_filter_text(q) {
            eprintln!("bad filter {q:?}: {e}");
            continue;
        }
        proxy.invalidate(&rows);
        println!("filter {:>16}: {} rows in {:?}", q, proxy.row_count(), t.elapsed());
    }
}
