#![forbid(unsafe_code)]

use std::rc::Rc;

use wrangler_client::{Call, ClientError, FarmFixture, JobFilter, MemoryFarm};
use wrangler_core::{Cluster, Job, JobState, Layer, ObjectId, Role, TaskState, TaskStateTotals};
use wrangler_store::{ClusterSource, JobSource, LayerSource, TableModel};

fn id(n: u8) -> ObjectId { uuid::Uuid::from_bytes([n; 16]) }

fn cluster(n: u8, name: &str, cores: u32) -> Cluster {
    let mut c = Cluster { id: id(n), name: name.to_string(), ..Default::default() };
    c.total.cores = cores;
    c
}

fn layer(n: u8, job: u8, name: &str, dead: u32) -> Layer {
    Layer {
        id: id(n),
        job_id: id(job),
        name: name.to_string(),
        totals: TaskStateTotals { dead, waiting: 1, ..Default::default() },
        ..Default::default()
    }
}

fn names<S: wrangler_store::Source>(m: &TableModel<S>) -> Vec<String> {
    (0..m.len()).map(|r| m.cell(r, 0, Role::Display).to_text()).collect()
}

fn farm(clusters: Vec<Cluster>, layers: Vec<Layer>) -> Rc<MemoryFarm> {
    let job = Job { id: id(100), name: "shot_010".into(), state: JobState::Running, ..Default::default() };
    Rc::new(MemoryFarm::new(FarmFixture { clusters, layers, jobs: vec![job], ..Default::default() }))
}

#[test]
fn refresh_twice_is_idempotent() {
    let f = farm(vec![cluster(1, "a", 10), cluster(2, "b", 20), cluster(3, "c", 30)], vec![]);
    let mut m = TableModel::new(ClusterSource::new(f.clone()));
    m.refresh().expect("first refresh");
    let first: Vec<(Option<usize>, String, String)> = [1, 2, 3]
        .iter()
        .map(|n| {
            let pos = m.position(id(*n));
            let p = pos.unwrap_or(usize::MAX);
            (pos, m.cell(p, 0, Role::Display).to_text(), m.cell(p, 6, Role::Display).to_text())
        })
        .collect();

    let stats = m.refresh().expect("second refresh");
    assert_eq!(stats.added, 0);
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.updated, 3);
    let second: Vec<(Option<usize>, String, String)> = [1, 2, 3]
        .iter()
        .map(|n| {
            let pos = m.position(id(*n));
            let p = pos.unwrap_or(usize::MAX);
            (pos, m.cell(p, 0, Role::Display).to_text(), m.cell(p, 6, Role::Display).to_text())
        })
        .collect();
    assert_eq!(first, second);
}

#[test]
fn pruning_model_drops_missing_rows_and_keeps_order() {
    let f = farm(vec![cluster(1, "A", 1), cluster(2, "B", 1), cluster(3, "C", 1)], vec![]);
    let mut m = TableModel::new(ClusterSource::new(f.clone()));
    assert!(m.remove_missing());
    m.refresh().expect("refresh");
    assert_eq!(names(&m), vec!["A", "B", "C"]);

    f.with_state(|s| s.clusters.retain(|c| c.name != "B"));
    let stats = m.refresh().expect("refresh");
    assert_eq!(stats.removed, 1);
    assert_eq!(names(&m), vec!["A", "C"]);
    assert!(m.get(id(2)).is_none());
    assert_eq!(m.position(id(1)), Some(0));
    assert_eq!(m.position(id(3)), Some(1));
}

#[test]
fn rows_update_in_place_and_new_rows_append() {
    let f = farm(vec![cluster(1, "A", 1), cluster(2, "B", 1)], vec![]);
    let mut m = TableModel::new(ClusterSource::new(f.clone()));
    m.refresh().expect("refresh");

    // the farm reorders and grows; row positions must not follow its order
    f.with_state(|s| {
        s.clusters.reverse();
        s.clusters[0].total.cores = 64;
        s.clusters.insert(0, cluster(3, "C", 8));
    });
    let stats = m.refresh().expect("refresh");
    assert_eq!(stats.added, 1);
    assert_eq!(names(&m), vec!["A", "B", "C"]);
    assert_eq!(m.get(id(2)).map(|c| c.total.cores), Some(64));
}

#[test]
fn layer_model_keeps_rows_missing_from_snapshot() {
    let f = farm(vec![], vec![layer(1, 100, "A", 0), layer(2, 100, "B", 0)]);
    let mut m = TableModel::new(LayerSource::new(f.clone()));
    assert!(!m.remove_missing());
    m.set_scope(Some(id(100))).expect("scope");
    assert_eq!(m.len(), 2);

    f.with_state(|s| s.layers.retain(|l| l.name == "A"));
    let stats = m.refresh().expect("refresh");
    assert_eq!(stats.removed, 0);
    assert_eq!(names(&m), vec!["A", "B"]);
}

#[test]
fn unscoped_layer_model_is_empty_and_quiet() {
    let f = farm(vec![], vec![layer(1, 100, "A", 0)]);
    let mut m = TableModel::new(LayerSource::new(f.clone()));
    let stats = m.refresh().expect("refresh");
    assert!(stats.skipped);
    assert!(m.is_empty());
    assert!(f.calls().is_empty(), "no remote call without a scope");

    m.set_scope(None).expect("clearing scope is not an error");
    assert!(m.is_empty());
}

#[test]
fn scope_switch_replaces_rows() {
    let f = farm(vec![], vec![layer(1, 100, "A", 0), layer(5, 101, "other", 0)]);
    let mut m = TableModel::new(LayerSource::new(f.clone()));
    m.set_scope(Some(id(100))).expect("scope");
    assert_eq!(names(&m), vec!["A"]);
    m.set_scope(Some(id(101))).expect("scope");
    assert_eq!(names(&m), vec!["other"]);
    assert_eq!(f.calls(), vec![Call::GetLayers(id(100)), Call::GetLayers(id(101))]);
}

#[test]
fn failed_fetch_keeps_previous_rows() {
    let f = farm(vec![cluster(1, "A", 1)], vec![]);
    let mut m = TableModel::new(ClusterSource::new(f.clone()));
    m.refresh().expect("refresh");
    let epoch = m.epoch();
    f.fail_on("get_clusters", ClientError::Unavailable("farm down".into()));
    assert!(m.refresh().is_err());
    assert_eq!(names(&m), vec!["A"]);
    assert_eq!(m.epoch(), epoch, "no change notification on failure");
}

#[test]
fn failed_scope_switch_drops_old_scope_rows() {
    let f = farm(vec![], vec![layer(1, 100, "A", 0), layer(2, 100, "B", 0), layer(5, 101, "other", 0)]);
    let mut m = TableModel::new(LayerSource::new(f.clone()));
    m.set_scope(Some(id(100))).expect("scope");
    assert_eq!(names(&m), vec!["A", "B"]);

    f.fail_on("get_layers", ClientError::Unavailable("farm down".into()));
    assert!(m.set_scope(Some(id(101))).is_err());
    assert_eq!(m.scope(), Some(id(101)));
    assert!(m.is_empty(), "rows of the old job must not survive the switch");
    assert_eq!(m.position(id(1)), None);

    f.heal();
    m.refresh().expect("refresh");
    assert_eq!(names(&m), vec!["other"]);
}

#[test]
fn fetched_totals_satisfy_the_sum_invariant() {
    let f = farm(vec![], vec![layer(1, 100, "A", 3), layer(2, 100, "B", 0)]);
    f.with_state(|s| {
        s.tasks = (0..5u8)
            .map(|i| wrangler_core::Task {
                id: id(200 + i),
                job_id: id(100),
                layer_id: id(1),
                state: if i % 2 == 0 { TaskState::Dead } else { TaskState::Succeeded },
                ..Default::default()
            })
            .collect();
    });
    let mut layers = TableModel::new(LayerSource::new(f.clone()));
    layers.set_scope(Some(id(100))).expect("scope");
    let mut jobs = TableModel::new(JobSource::new(f.clone(), JobFilter::default()));
    jobs.refresh().expect("jobs");

    let sum = |t: &TaskStateTotals| t.waiting + t.running + t.dead + t.eaten + t.depend + t.succeeded;
    for l in layers.rows() {
        assert_eq!(l.totals.total(), sum(&l.totals));
    }
    for j in jobs.rows() {
        assert_eq!(j.totals.total(), sum(&j.totals));
    }
    assert_eq!(layers.get(id(1)).map(|l| l.totals.dead), Some(3));
    assert_eq!(jobs.rows()[0].totals.total(), 5);
}

#[test]
fn job_model_passes_its_filter() {
    let f = farm(vec![], vec![]);
    let mut m = TableModel::new(JobSource::new(f.clone(), JobFilter::running()));
    m.refresh().expect("refresh");
    assert_eq!(m.len(), 1);
    assert_eq!(f.calls(), vec![Call::GetJobs(JobFilter::running())]);
}
