#![forbid(unsafe_code)]

use std::cell::Cell;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use metrics::counter;
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};
use wrangler_client::{FarmClient, JobFilter, MemoryFarm};
use wrangler_core::{Cluster, Job, Layer, ObjectId, Role, SourceModel, Tabular};
use wrangler_ops::{
    apply_cluster_edit, job_menu, layer_menu, set_clusters_locked, AssumeYes, ClusterEdit, Confirm, Dispatcher,
    JobAction, Outcome,
};
use wrangler_panels::{cluster_panel, job_panel, layer_panel, Config, EventBus, JobPicker, Panel};
use wrangler_search::SortOrder;
use wrangler_store::Source;

mod render;

const DEMO_FIXTURE: &str = include_str!("../fixtures/demo.json");

#[derive(Parser, Debug)]
#[command(name = "wranglerctl", version, about = "Render-farm console in the terminal")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Farm fixture (JSON). Falls back to WRANGLER_FIXTURE, then the built-in demo farm
    #[arg(long = "fixture", global = true)]
    fixture: Option<PathBuf>,

    /// Write the farm back to the fixture after a mutating command
    #[arg(long = "save", global = true, action = ArgAction::SetTrue)]
    save: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum PanelKind { Clusters, Layers, Jobs }

#[derive(Args, Debug, Clone, Default)]
struct ViewArgs {
    /// Name filter; words must appear in order, `*` and `?` are wildcards
    #[arg(long = "filter")]
    filter: Option<String>,
    /// Column to sort by (header label or index)
    #[arg(long = "sort")]
    sort: Option<String>,
    /// Sort descending
    #[arg(long = "desc", action = ArgAction::SetTrue)]
    desc: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List clusters
    Clusters {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// List the layers of a job (name or id)
    Layers {
        #[arg(long = "job")]
        job: String,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// List jobs (running only unless --all)
    Jobs {
        #[arg(long = "all", action = ArgAction::SetTrue)]
        all: bool,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Job picker: list running job names, or resolve picked rows to jobs
    Pick {
        #[arg(long = "filter")]
        filter: Option<String>,
        /// Rows of the filtered list (0-based)
        rows: Vec<usize>,
    },
    /// Poll a panel and print it whenever its rows change
    Watch {
        #[arg(value_enum, default_value_t = PanelKind::Jobs)]
        panel: PanelKind,
        /// Job of interest (layers panel)
        #[arg(long = "job")]
        job: Option<String>,
        /// Stop after this many polls
        #[arg(long = "ticks")]
        ticks: Option<u64>,
        #[arg(long = "poll-ms", default_value_t = 1000)]
        poll_ms: u64,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Run a job action: pause, unpause, toggle-pause, kill, kill-tasks,
    /// eat-dead, retry-dead, or `menu` to show the context menu
    Job {
        action: String,
        #[arg(required = true)]
        names: Vec<String>,
        /// Do not ask for confirmation
        #[arg(long = "yes", short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Layer action on layers of one job: `drop-depends`, or `menu` to show
    /// the context menu
    Layer {
        action: String,
        #[arg(long = "job")]
        job: String,
        #[arg(required = true)]
        names: Vec<String>,
        /// Do not ask for confirmation
        #[arg(long = "yes", short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Cluster operations
    Cluster {
        #[command(subcommand)]
        op: ClusterCmd,
    },
}

#[derive(Subcommand, Debug)]
enum ClusterCmd {
    Lock {
        #[arg(required = true)]
        names: Vec<String>,
    },
    Unlock {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Edit cluster properties; only changed fields are sent
    Edit {
        name: String,
        #[arg(long = "rename")]
        rename: Option<String>,
        /// Comma-separated tag list replacing the current tags
        #[arg(long = "tags", value_delimiter = ',')]
        tags: Option<Vec<String>>,
        #[arg(long = "lock", action = ArgAction::SetTrue, conflicts_with = "unlock")]
        lock: bool,
        #[arg(long = "unlock", action = ArgAction::SetTrue)]
        unlock: bool,
        #[arg(long = "default", action = ArgAction::SetTrue)]
        default: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("WRANGLER_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("WRANGLER_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid WRANGLER_METRICS_ADDR; expected host:port");
        }
    }
}

fn open_farm(path: Option<&Path>) -> Result<Rc<MemoryFarm>> {
    let farm = match path {
        Some(p) => MemoryFarm::load(p)?,
        None => MemoryFarm::from_json(DEMO_FIXTURE).context("parsing built-in demo farm")?,
    };
    Ok(Rc::new(farm))
}

fn save_farm(farm: &MemoryFarm, save: bool, path: Option<&Path>) -> Result<()> {
    if !save {
        return Ok(());
    }
    let Some(path) = path else { bail!("--save needs a fixture file (--fixture or WRANGLER_FIXTURE)") };
    let text = serde_json::to_string_pretty(&farm.snapshot())?;
    std::fs::write(path, text).with_context(|| format!("writing farm fixture {}", path.display()))?;
    info!(path = %path.display(), "farm fixture saved");
    Ok(())
}

/// Header label (case-insensitive) or column index.
fn column_index(headers: &[&str], key: &str) -> Result<usize> {
    if let Ok(i) = key.parse::<usize>() {
        if i < headers.len() {
            return Ok(i);
        }
        bail!("column {} out of range (0..{})", i, headers.len());
    }
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(key))
        .ok_or_else(|| anyhow!("unknown column {:?}; expected one of: {}", key, headers.join(", ")))
}

fn apply_view<S: Source>(panel: &mut Panel<S>, view: &ViewArgs) -> Result<()> {
    if let Some(f) = view.filter.as_deref() {
        panel.set_filter_text(f).with_context(|| format!("invalid filter {:?}", f))?;
    }
    if let Some(key) = view.sort.as_deref() {
        let col = column_index(&panel.headers(), key)?;
        panel.sort_by_column(col, if view.desc { SortOrder::Descending } else { SortOrder::Ascending });
    }
    Ok(())
}

fn print_panel<S: Source>(panel: &Panel<S>, output: Output) -> Result<()>
where
    S::Item: Serialize,
{
    match output {
        Output::Human => {
            let headers = panel.headers();
            let rows: Vec<Vec<String>> = (0..panel.row_count())
                .map(|r| (0..headers.len()).map(|c| render::cell_text(&panel.cell(r, c, Role::Display))).collect())
                .collect();
            print!("{}", render::table(&headers, &rows));
        }
        Output::Json => {
            let all: Vec<usize> = (0..panel.row_count()).collect();
            println!("{}", serde_json::to_string_pretty(&panel.selected(&all))?);
        }
    }
    Ok(())
}

fn print_items<T: Tabular + Serialize>(items: &[T], output: Output) -> Result<()> {
    match output {
        Output::Human => {
            let headers = T::headers();
            let rows: Vec<Vec<String>> = (0..items.row_count())
                .map(|r| (0..headers.len()).map(|c| render::cell_text(&items.cell(r, c, Role::Display))).collect())
                .collect();
            print!("{}", render::table(&headers, &rows));
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(items)?),
    }
    Ok(())
}

fn print_outcome(outcome: &impl Serialize, human: &str, output: Output) -> Result<()> {
    match output {
        Output::Human => println!("{}", human),
        Output::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
    }
    Ok(())
}

/// Jobs by exact name; unknown names are reported, an empty result is an error.
fn resolve_jobs(client: &dyn FarmClient, names: &[String]) -> Result<Vec<Job>> {
    let jobs = client.get_jobs(&JobFilter::default().with_names(names.to_vec()))?;
    for n in names {
        if !jobs.iter().any(|j| &j.name == n) {
            warn!(name = %n, "no such job");
        }
    }
    if jobs.is_empty() {
        bail!("no jobs matched: {}", names.join(", "));
    }
    Ok(jobs)
}

fn resolve_job_id(client: &dyn FarmClient, key: &str) -> Result<ObjectId> {
    if let Ok(id) = ObjectId::parse_str(key) {
        return Ok(id);
    }
    Ok(resolve_jobs(client, &[key.to_string()])?[0].id)
}

/// Layers of `job` by exact name; every name must match.
fn resolve_layers(client: &dyn FarmClient, job: ObjectId, names: &[String]) -> Result<Vec<Layer>> {
    let all = client.get_layers(job)?;
    names
        .iter()
        .map(|n| all.iter().find(|l| &l.name == n).cloned().ok_or_else(|| anyhow!("no such layer: {}", n)))
        .collect()
}

fn resolve_clusters(client: &dyn FarmClient, names: &[String]) -> Result<Vec<Cluster>> {
    let all = client.get_clusters()?;
    names
        .iter()
        .map(|n| all.iter().find(|c| &c.name == n).cloned().ok_or_else(|| anyhow!("no such cluster: {}", n)))
        .collect()
}

/// Interactive yes/no on stderr/stdin. EOF or a read error means no.
fn ask(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

async fn watch_panel<S: Source>(mut panel: Panel<S>, output: Output, ticks: Option<u64>, poll: Duration) -> Result<()>
where
    S::Item: Serialize,
{
    let mut epochs = panel.model().subscribe();
    let mut ticker = tokio::time::interval(poll);
    let mut polls = 0u64;
    info!(panel = panel.name(), interval_secs = panel.interval().as_secs(), "watch started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = panel.tick(Instant::now()) {
                    warn!(panel = panel.name(), error = %e, "poll failed; keeping last rows");
                }
                if epochs.has_changed().unwrap_or(false) {
                    let epoch = *epochs.borrow_and_update();
                    if output == Output::Human {
                        println!("-- {} epoch {} ({} rows)", panel.name(), epoch, panel.row_count());
                    }
                    print_panel(&panel, output)?;
                }
                polls += 1;
                if ticks.map_or(false, |t| polls >= t) {
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl-C received; stopping watch");
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let cfg = Config::from_env();
    let fixture = cli.fixture.clone().or_else(|| cfg.fixture.clone());
    let farm = open_farm(fixture.as_deref())?;
    let client: Rc<dyn FarmClient> = farm.clone();
    let bus = Rc::new(EventBus::new());

    match cli.command {
        Commands::Clusters { view } => {
            counter!("cli_commands_total", 1u64, "command" => "clusters");
            let mut panel = cluster_panel(client, bus, &cfg);
            panel.refresh()?;
            apply_view(&mut panel, &view)?;
            print_panel(&panel, cli.output)?;
        }
        Commands::Layers { job, view } => {
            counter!("cli_commands_total", 1u64, "command" => "layers");
            let job_id = resolve_job_id(client.as_ref(), &job)?;
            let mut panel = layer_panel(client, bus, &cfg);
            panel.set_scope(Some(job_id))?;
            apply_view(&mut panel, &view)?;
            print_panel(&panel, cli.output)?;
        }
        Commands::Jobs { all, view } => {
            counter!("cli_commands_total", 1u64, "command" => "jobs");
            let filter = if all { JobFilter::default() } else { JobFilter::running() };
            let mut panel = job_panel(client, bus, &cfg, filter);
            panel.refresh()?;
            apply_view(&mut panel, &view)?;
            print_panel(&panel, cli.output)?;
        }
        Commands::Pick { filter, rows } => {
            counter!("cli_commands_total", 1u64, "command" => "pick");
            let mut picker = JobPicker::open(client)?;
            if let Some(f) = filter.as_deref() {
                picker.set_filter_text(f).with_context(|| format!("invalid filter {:?}", f))?;
            }
            if rows.is_empty() {
                match cli.output {
                    Output::Human => {
                        for (i, name) in picker.visible().iter().enumerate() {
                            println!("{:>3}  {}", i, name);
                        }
                    }
                    Output::Json => println!("{}", serde_json::to_string_pretty(&picker.visible())?),
                }
            } else {
                let jobs = picker.resolve(&rows)?;
                print_items(&jobs, cli.output)?;
            }
        }
        Commands::Watch { panel, job, ticks, poll_ms, view } => {
            counter!("cli_commands_total", 1u64, "command" => "watch");
            let poll = Duration::from_millis(poll_ms.max(10));
            match panel {
                PanelKind::Clusters => {
                    let mut p = cluster_panel(client, bus, &cfg);
                    apply_view(&mut p, &view)?;
                    watch_panel(p, cli.output, ticks, poll).await?;
                }
                PanelKind::Jobs => {
                    let mut p = job_panel(client, bus, &cfg, JobFilter::running());
                    apply_view(&mut p, &view)?;
                    watch_panel(p, cli.output, ticks, poll).await?;
                }
                PanelKind::Layers => {
                    let Some(job) = job else { bail!("watch layers needs --job") };
                    let job_id = resolve_job_id(client.as_ref(), &job)?;
                    let mut p = layer_panel(client, bus.clone(), &cfg);
                    bus.job_of_interest.publish(job_id);
                    apply_view(&mut p, &view)?;
                    watch_panel(p, cli.output, ticks, poll).await?;
                }
            }
        }
        Commands::Job { action, names, yes } => {
            counter!("cli_commands_total", 1u64, "command" => "job");
            let jobs = resolve_jobs(client.as_ref(), &names)?;
            if action == "menu" {
                let menu = job_menu(&jobs);
                match cli.output {
                    Output::Human => {
                        for entry in menu.iter() {
                            if entry.action.is_none() {
                                println!("----");
                            } else {
                                println!("{}", entry.label);
                            }
                        }
                    }
                    Output::Json => println!("{}", serde_json::to_string_pretty(&menu)?),
                }
                return Ok(());
            }
            let action = if action == "toggle-pause" {
                JobAction::toggle_pause(&jobs).ok_or_else(|| anyhow!("no jobs selected"))?
            } else {
                JobAction::from_str(&action).map_err(|e| anyhow!(e))?
            };
            let dispatcher = Dispatcher::new(client.clone()).with_kill_reason(cfg.kill_reason.clone());
            let mut confirm: Box<dyn Confirm> = if yes { Box::new(AssumeYes) } else { Box::new(ask) };
            let refreshed = Cell::new(false);
            let outcome = dispatcher.dispatch(action, &jobs, confirm.as_mut(), || refreshed.set(true))?;
            let human = match outcome {
                Outcome::NothingToDo => "nothing to do".to_string(),
                Outcome::Cancelled => "cancelled".to_string(),
                Outcome::Executed { calls } => format!("{}: {} call(s)", action.label(jobs.len()), calls),
            };
            print_outcome(&outcome, &human, cli.output)?;
            if refreshed.get() && cli.output == Output::Human {
                let ids: Vec<ObjectId> = jobs.iter().map(|j| j.id).collect();
                let after: Vec<Job> = client.get_jobs(&JobFilter::default())?.into_iter().filter(|j| ids.contains(&j.id)).collect();
                print_items(&after, cli.output)?;
            }
            save_farm(&farm, cli.save && refreshed.get(), fixture.as_deref())?;
        }
        Commands::Layer { action, job, names, yes } => {
            counter!("cli_commands_total", 1u64, "command" => "layer");
            let job = resolve_job_id(client.as_ref(), &job)?;
            let layers = resolve_layers(client.as_ref(), job, &names)?;
            match action.as_str() {
                "menu" => {
                    let menu = layer_menu(&layers);
                    match cli.output {
                        Output::Human => menu.iter().for_each(|e| println!("{}", e.label)),
                        Output::Json => println!("{}", serde_json::to_string_pretty(&menu)?),
                    }
                }
                "drop-depends" => {
                    let dispatcher = Dispatcher::new(client.clone());
                    let mut confirm: Box<dyn Confirm> = if yes { Box::new(AssumeYes) } else { Box::new(ask) };
                    let refreshed = Cell::new(false);
                    let outcome = dispatcher.drop_depends(&layers, confirm.as_mut(), || refreshed.set(true))?;
                    let human = match outcome {
                        Outcome::NothingToDo => "nothing to do".to_string(),
                        Outcome::Cancelled => "cancelled".to_string(),
                        Outcome::Executed { calls } => format!("Drop Depends: {} call(s)", calls),
                    };
                    print_outcome(&outcome, &human, cli.output)?;
                    if refreshed.get() && cli.output == Output::Human {
                        let mut panel = layer_panel(client.clone(), bus.clone(), &cfg);
                        panel.set_scope(Some(job))?;
                        print_panel(&panel, cli.output)?;
                    }
                    save_farm(&farm, cli.save && refreshed.get(), fixture.as_deref())?;
                }
                other => bail!("unknown layer action: {}", other),
            }
        }
        Commands::Cluster { op } => {
            counter!("cli_commands_total", 1u64, "command" => "cluster");
            match op {
                ClusterCmd::Lock { names } => lock_clusters(&farm, client, bus, &cfg, &names, true, cli.output, cli.save, fixture.as_deref())?,
                ClusterCmd::Unlock { names } => lock_clusters(&farm, client, bus, &cfg, &names, false, cli.output, cli.save, fixture.as_deref())?,
                ClusterCmd::Edit { name, rename, tags, lock, unlock, default } => {
                    let current = resolve_clusters(client.as_ref(), &[name])?.remove(0);
                    let mut edit = ClusterEdit::from_cluster(&current);
                    if let Some(n) = rename {
                        edit.name = n;
                    }
                    if let Some(t) = tags {
                        edit.tags = t;
                    }
                    if lock {
                        edit.locked = true;
                    } else if unlock {
                        edit.locked = false;
                    }
                    if default {
                        edit.default = true;
                    }
                    let edit = edit.normalized();
                    let mut notify = |title: &str, text: &str| eprintln!("{}: {}", title, text);
                    let saved = Cell::new(false);
                    let result = apply_cluster_edit(client.as_ref(), &current, &edit, &mut notify, || saved.set(true));
                    if saved.get() {
                        let mut panel = cluster_panel(client, bus, &cfg);
                        panel.refresh()?;
                        print_panel(&panel, cli.output)?;
                        save_farm(&farm, cli.save, fixture.as_deref())?;
                    }
                    let calls = result?;
                    info!(calls, "cluster edit applied");
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn lock_clusters(
    farm: &MemoryFarm,
    client: Rc<dyn FarmClient>,
    bus: Rc<EventBus>,
    cfg: &Config,
    names: &[String],
    locked: bool,
    output: Output,
    save: bool,
    fixture: Option<&Path>,
) -> Result<()> {
    let ids: Vec<ObjectId> = resolve_clusters(client.as_ref(), names)?.iter().map(|c| c.id).collect();
    let mut panel = cluster_panel(client.clone(), bus, cfg);
    let result = set_clusters_locked(client.as_ref(), &ids, locked, || {
        if let Err(e) = panel.refresh() {
            warn!(error = %e, "cluster refresh failed");
        }
    });
    print_panel(&panel, output)?;
    let done = result?;
    info!(clusters = done, locked, "cluster lock state changed");
    save_farm(farm, save, fixture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_fixture_parses() {
        let farm = open_farm(None).expect("demo farm");
        assert_eq!(farm.get_clusters().expect("clusters").len(), 3);
        let running = farm.get_jobs(&JobFilter::running()).expect("jobs");
        assert_eq!(running.len(), 3);
        assert!(running.iter().any(|j| j.has_errors()));
    }

    #[test]
    fn columns_resolve_by_label_or_index() {
        let headers = ["Name", "Usage", "Nodes"];
        assert_eq!(column_index(&headers, "usage").expect("label"), 1);
        assert_eq!(column_index(&headers, "2").expect("index"), 2);
        assert!(column_index(&headers, "7").is_err());
        assert!(column_index(&headers, "bogus").is_err());
    }

    #[test]
    fn cli_parses_job_actions() {
        let cli = Cli::try_parse_from(["wranglerctl", "job", "eat-dead", "a", "b", "--yes"]).expect("parse");
        match cli.command {
            Commands::Job { action, names, yes } => {
                assert_eq!(action, "eat-dead");
                assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
                assert!(yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["wranglerctl", "cluster", "edit", "x", "--lock", "--unlock"]).is_err());
    }

    #[test]
    fn layer_names_resolve_within_the_job() {
        let farm = open_farm(None).expect("demo farm");
        let job = farm.get_jobs(&JobFilter::running()).expect("jobs").remove(0);
        let first = farm.get_layers(job.id).expect("layers").remove(0);
        let found = resolve_layers(farm.as_ref(), job.id, &[first.name.clone()]).expect("resolve");
        assert_eq!(found[0].id, first.id);
        assert!(resolve_layers(farm.as_ref(), job.id, &["no-such-layer".to_string()]).is_err());
        assert!(Cli::try_parse_from(["wranglerctl", "layer", "drop-depends", "--job", "j"]).is_err());
    }
}
