use std::rc::Rc;
use std::time::{Duration, Instant};

use wrangler_client::{Call, ClientError, FarmFixture, JobFilter, MemoryFarm};
use wrangler_core::{Cluster, Job, JobState, Layer, ObjectId, Role, Task, TaskState};
use wrangler_panels::{cluster_panel, job_panel, layer_panel, Config, EventBus, JobPicker};
use wrangler_search::SortOrder;

fn id(n: u8) -> ObjectId { ObjectId::from_bytes([n; 16]) }

fn farm() -> Rc<MemoryFarm> {
    let jobs = vec![
        Job { id: id(1), name: "shot_010_comp".into(), state: JobState::Running, ..Default::default() },
        Job { id: id(2), name: "shot_002_light".into(), state: JobState::Running, ..Default::default() },
        Job { id: id(3), name: "shot_001_old".into(), state: JobState::Finished, ..Default::default() },
    ];
    let layers = vec![
        Layer { id: id(10), job_id: id(1), name: "beauty".into(), ..Default::default() },
        Layer { id: id(11), job_id: id(1), name: "alpha".into(), ..Default::default() },
        Layer { id: id(20), job_id: id(2), name: "key".into(), ..Default::default() },
    ];
    let tasks = vec![
        Task { id: id(100), job_id: id(1), layer_id: id(10), state: TaskState::Dead, ..Default::default() },
        Task { id: id(101), job_id: id(1), layer_id: id(11), state: TaskState::Succeeded, ..Default::default() },
    ];
    let clusters = vec![
        Cluster { id: id(50), name: "render".into(), ..Default::default() },
        Cluster { id: id(51), name: "comp".into(), ..Default::default() },
    ];
    Rc::new(MemoryFarm::new(FarmFixture { clusters, jobs, layers, tasks }))
}

#[test]
fn tick_refreshes_on_interval() {
    let f = farm();
    let bus = Rc::new(EventBus::new());
    let mut p = cluster_panel(f.clone(), bus, &Config::default());
    let t0 = Instant::now();
    assert!(p.tick(t0).expect("tick"));
    assert_eq!(p.row_count(), 2);
    f.clear_calls();

    assert!(!p.tick(t0 + Duration::from_secs(3)).expect("tick"));
    assert!(f.calls().is_empty());
    assert!(p.tick(t0 + Duration::from_secs(10)).expect("tick"));
    assert_eq!(f.calls(), vec![Call::GetClusters]);
}

#[test]
fn layer_panel_follows_job_of_interest() {
    let f = farm();
    let bus = Rc::new(EventBus::new());
    let cfg = Config::default();
    let mut jobs = job_panel(f.clone(), bus.clone(), &cfg, JobFilter::running());
    let mut layers = layer_panel(f.clone(), bus.clone(), &cfg);
    let t0 = Instant::now();

    // no job yet: nothing fetched
    assert!(!layers.tick(t0).expect("tick"));
    assert_eq!(layers.row_count(), 0);
    assert!(!f.calls().iter().any(|c| matches!(c, Call::GetLayers(_))));

    jobs.tick(t0).expect("jobs");
    jobs.sort_by_column(0, SortOrder::Ascending);
    assert_eq!(jobs.activate(0).as_deref(), Some("shot_002_light"));
    layers.sort_by_column(0, SortOrder::Ascending);
    assert_eq!(jobs.double_activate(1), Some(id(1)));

    assert!(layers.tick(t0 + Duration::from_secs(1)).expect("tick"));
    assert_eq!(layers.model().scope(), Some(id(1)));
    // sort cleared on job switch: source order
    assert_eq!(layers.proxy().sort_state(), None);
    let names: Vec<String> = (0..layers.row_count()).map(|r| layers.cell(r, 0, Role::Display).to_text()).collect();
    assert_eq!(names, vec!["beauty", "alpha"]);
}

#[test]
fn failed_job_switch_never_shows_the_previous_jobs_layers() {
    let f = farm();
    let bus = Rc::new(EventBus::new());
    let mut layers = layer_panel(f.clone(), bus.clone(), &Config::default());
    let t0 = Instant::now();

    bus.job_of_interest.publish(id(1));
    assert!(layers.tick(t0).expect("tick"));
    assert_eq!(layers.row_count(), 2);

    f.fail_on("get_layers", ClientError::Unavailable("farm down".into()));
    bus.job_of_interest.publish(id(2));
    assert!(layers.tick(t0 + Duration::from_secs(1)).is_err());
    assert_eq!(layers.model().scope(), Some(id(2)));
    assert_eq!(layers.row_count(), 0);
    assert!(layers.selected(&[0]).is_empty());

    f.heal();
    f.clear_calls();
    assert!(layers.tick(t0 + Duration::from_secs(6)).expect("tick"));
    assert_eq!(f.calls(), vec![Call::GetLayers(id(2))]);
    let names: Vec<String> = (0..layers.row_count()).map(|r| layers.cell(r, 0, Role::Display).to_text()).collect();
    assert_eq!(names, vec!["key"]);
}

#[test]
fn selection_resolves_by_id_after_resort() {
    let f = farm();
    let bus = Rc::new(EventBus::new());
    let mut p = cluster_panel(f.clone(), bus.clone(), &Config::default());
    p.refresh().expect("refresh");
    p.sort_by_column(0, SortOrder::Ascending);
    let picked: Vec<ObjectId> = p.selected(&[0]).iter().map(|c| c.id).collect();
    assert_eq!(picked, vec![id(51)]);
    p.toggle_sort(0);
    let picked: Vec<ObjectId> = p.selected(&[0]).iter().map(|c| c.id).collect();
    assert_eq!(picked, vec![id(50)]);
    assert_eq!(p.double_activate(0), Some(id(50)));
    assert_eq!(bus.cluster_of_interest.latest(), Some(id(50)));
}

#[test]
fn failed_refresh_keeps_rows() {
    let f = farm();
    let bus = Rc::new(EventBus::new());
    let mut p = job_panel(f.clone(), bus, &Config::default(), JobFilter::default());
    p.refresh().expect("refresh");
    assert_eq!(p.row_count(), 3);
    f.fail_on("get_jobs", ClientError::Unavailable("farm down".into()));
    assert!(p.refresh().is_err());
    assert_eq!(p.row_count(), 3);
    p.set_filter_text("002").expect("filter");
    assert_eq!(p.row_count(), 1);
}

#[test]
fn picker_lists_running_jobs_sorted_and_resolves_names() {
    let f = farm();
    let mut picker = JobPicker::open(f.clone()).expect("open");
    assert_eq!(picker.visible(), vec!["shot_002_light", "shot_010_comp"]);

    picker.set_filter_text("shot comp").expect("filter");
    assert_eq!(picker.visible(), vec!["shot_010_comp"]);

    f.clear_calls();
    assert!(picker.resolve(&[]).expect("resolve").is_empty());
    assert!(f.calls().is_empty());

    let jobs = picker.resolve(&[0]).expect("resolve");
    assert_eq!(jobs.iter().map(|j| j.id).collect::<Vec<_>>(), vec![id(1)]);
    assert_eq!(f.calls().len(), 1);
}
