use std::rc::Rc;

use wrangler_client::{FarmFixture, MemoryFarm};
use wrangler_core::{Cluster, ObjectId, Role};
use wrangler_search::{SortFilterProxy, SortOrder};
use wrangler_store::{ClusterSource, TableModel};

fn id(n: u8) -> ObjectId { uuid::Uuid::from_bytes([n; 16]) }

fn cluster(n: u8, name: &str) -> Cluster {
    Cluster { id: id(n), name: name.to_string(), ..Default::default() }
}

#[test]
fn selection_survives_refresh_and_resort() {
    let farm = Rc::new(MemoryFarm::new(FarmFixture {
        clusters: vec![cluster(1, "farm10"), cluster(2, "farm9"), cluster(3, "farm1")],
        ..Default::default()
    }));
    let mut model = TableModel::new(ClusterSource::new(farm.clone()));
    model.refresh().expect("refresh");

    let mut proxy = SortFilterProxy::new().with_sort_role(Role::Display);
    proxy.sort_by_column(0, SortOrder::Ascending);
    proxy.invalidate(&model);
    let names: Vec<String> = (0..proxy.row_count()).map(|r| proxy.cell(&model, r, 0, Role::Display).to_text()).collect();
    assert_eq!(names, vec!["farm1", "farm9", "farm10"]);

    // select "farm9" by its proxy row, then let the farm add a row that sorts before it
    let selected = proxy.ids(&model, &[1]);
    assert_eq!(selected, vec![id(2)]);
    farm.with_state(|s| s.clusters.push(cluster(4, "farm0")));
    model.refresh().expect("refresh");
    proxy.invalidate(&model);

    let row = model.position(selected[0]).and_then(|src| proxy.map_from_source(src));
    assert_eq!(row, Some(2));
    assert_eq!(model.get(selected[0]).map(|c| c.name.as_str()), Some("farm9"));
    assert_eq!(model.rows()[0].name, "farm10", "source order is untouched by sorting");
}

#[test]
fn filter_narrows_and_clears() {
    let farm = Rc::new(MemoryFarm::new(FarmFixture {
        clusters: vec![cluster(1, "gpu-render"), cluster(2, "cpu-render"), cluster(3, "gpu-sim")],
        ..Default::default()
    }));
    let mut model = TableModel::new(ClusterSource::new(farm));
    model.refresh().expect("refresh");
    let mut proxy = SortFilterProxy::new();
    proxy.set_filter_text("gpu render").expect("filter");
    proxy.apply_if_needed(&model);
    assert_eq!(proxy.ids(&model, &[0]), vec![id(1)]);
    assert_eq!(proxy.row_count(), 1);

    proxy.set_filter_text("").expect("filter");
    proxy.apply_if_needed(&model);
    assert_eq!(proxy.row_count(), 3);
}
