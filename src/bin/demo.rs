//! Thin demo binary: registers a couple of in-memory peers, runs one
//! hardcoded query through [`execute_query`], and writes the result to
//! stdout. Not a network listener — wiring that up is out of scope
//! (`spec.md` §1 Non-goals).

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use livestatus_proxy_core::catalog::{ColumnDef, ColumnStorageKind, StaticCatalog, TableDef};
use livestatus_proxy_core::config::ProxyConfig;
use livestatus_proxy_core::metrics::Metrics;
use livestatus_proxy_core::peer::{Peer, PeerBackend, PeerFlags, PeerId, PeerRegistry};
use livestatus_proxy_core::request::{Direction, Filter, OutputFormat, Request, RequestedColumn, SortField};
use livestatus_proxy_core::row::DataRow;
use livestatus_proxy_core::store::{DataSet, DataStore, LockMode, StoreId};
use livestatus_proxy_core::value::{DataValue, ValueKind};

#[derive(Parser, Debug)]
#[command(name = "livestatus-proxy-demo")]
struct Cli {
    /// Optional TOML config file; falls back to `ProxyConfig::default()`.
    #[arg(long)]
    config: Option<PathBuf>,
}

struct NoopBackend;

#[async_trait]
impl PeerBackend for NoopBackend {
    async fn wait_condition(&self, _request: &Request) -> Result<(), String> {
        Ok(())
    }
    async fn resume_from_idle(&self) -> Result<(), String> {
        Ok(())
    }
    async fn pass_through_query(&self, _request: &Request) -> Result<serde_json::Value, String> {
        Ok(serde_json::Value::Null)
    }
}

fn hosts_table() -> TableDef {
    TableDef {
        name: "hosts".into(),
        virtual_table: false,
        passthrough_only: false,
        works_unlocked: false,
        columns: vec![
            ColumnDef { name: "name".into(), kind: ColumnStorageKind::Backend, value_kind: ValueKind::String },
            ColumnDef { name: "state".into(), kind: ColumnStorageKind::Backend, value_kind: ValueKind::Integer },
        ],
    }
}

fn seed_peer(id: &str, rows: Vec<DataRow>) -> Arc<Peer> {
    let peer = Arc::new(Peer::new(PeerId::from(id), PeerFlags::default(), Arc::new(NoopBackend)));
    let dataset = Arc::new(DataSet::new());
    dataset.insert(Arc::new(DataStore::new(StoreId(0), "hosts", LockMode::None, rows)));
    peer.set_dataset(Some(dataset));
    peer
}

fn demo_request() -> Request {
    Request {
        table: "hosts".into(),
        columns: vec![
            RequestedColumn { name: "name".into(), storage_kind: ColumnStorageKind::Backend, value_kind: ValueKind::String },
            RequestedColumn { name: "state".into(), storage_kind: ColumnStorageKind::Backend, value_kind: ValueKind::Integer },
        ],
        filter: Filter::None,
        stats: vec![],
        stats_grouped: None,
        sort: vec![SortField { column_index: 0, direction: Direction::Asc, group: false }],
        limit: None,
        offset: 0,
        backends: Default::default(),
        wait_trigger: None,
        output_format: OutputFormat::WrappedJson,
        fixed16: false,
        columns_header: Some(true),
        auth_user: None,
        send_stats_data: false,
    }
}

#[tokio::main]
async fn main() -> livestatus_proxy_core::Result<()> {
    tracing_subscriber::fmt().with_target(false).with_level(true).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(livestatus_proxy_core::ProxyError::from)?;
            ProxyConfig::from_toml_str(&text).map_err(|e| livestatus_proxy_core::ProxyError::InvariantViolation(e.to_string()))?
        }
        None => ProxyConfig::default(),
    };

    tracing::info!("starting livestatus-proxy-demo");

    let registry = PeerRegistry::new();
    registry.register(seed_peer("site-a", vec![DataRow::new(vec![DataValue::String("web02".into()), DataValue::Int(0)])]));
    registry.register(seed_peer("site-b", vec![DataRow::new(vec![DataValue::String("web01".into()), DataValue::Int(2)])]));

    let catalog = StaticCatalog::new().with_table(hosts_table());
    let metrics = Metrics::new();
    let outcome = livestatus_proxy_core::execute_query(
        demo_request(),
        &registry,
        &catalog,
        None,
        Arc::new(config),
        Arc::new(AtomicBool::new(false)),
        &metrics,
    )
    .await?;

    let mut out = std::io::stdout().lock();
    livestatus_proxy_core::writer::write_response(&mut out, &demo_request(), &outcome.response, &outcome.table, outcome.result_total, &metrics)?;

    tracing::debug!(bytes_sent = metrics.frontend_bytes_sent(), queries = metrics.queries_total(), "shutting down");

    Ok(())
}
