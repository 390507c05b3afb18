//! End-to-end scenarios from `spec.md` §8, driven through the public
//! `execute_query` + `writer::write_response` surface rather than internal
//! pipeline stages.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use livestatus_proxy_core::catalog::{ColumnDef, ColumnStorageKind, StaticCatalog, TableDef};
use livestatus_proxy_core::config::ProxyConfig;
use livestatus_proxy_core::execute_query;
use livestatus_proxy_core::metrics::Metrics;
use livestatus_proxy_core::peer::{Peer, PeerBackend, PeerFlags, PeerId, PeerRegistry};
use livestatus_proxy_core::request::{
    CompareOp, Direction, Filter, OutputFormat, Predicate, Request, RequestedColumn, SortField, StatsKind, StatsSpec,
};
use livestatus_proxy_core::row::DataRow;
use livestatus_proxy_core::store::{DataSet, DataStore, LockMode, StoreId};
use livestatus_proxy_core::value::{DataValue, ValueKind};
use livestatus_proxy_core::writer::write_response;

struct NoopBackend;
#[async_trait]
impl PeerBackend for NoopBackend {
    async fn wait_condition(&self, _r: &Request) -> Result<(), String> {
        Ok(())
    }
    async fn resume_from_idle(&self) -> Result<(), String> {
        Ok(())
    }
    async fn pass_through_query(&self, _r: &Request) -> Result<serde_json::Value, String> {
        Ok(serde_json::Value::Null)
    }
}

fn peer_with_rows(id: &str, table: &str, rows: Vec<DataRow>) -> Arc<Peer> {
    let peer = Arc::new(Peer::new(PeerId::from(id), PeerFlags::default(), Arc::new(NoopBackend)));
    let dataset = Arc::new(DataSet::new());
    dataset.insert(Arc::new(DataStore::new(StoreId(0), table, LockMode::None, rows)));
    peer.set_dataset(Some(dataset));
    peer
}

fn offline_peer(id: &str) -> Arc<Peer> {
    Arc::new(Peer::new(PeerId::from(id), PeerFlags::default(), Arc::new(NoopBackend)))
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

fn services_table() -> TableDef {
    TableDef {
        name: "services".into(),
        virtual_table: false,
        passthrough_only: false,
        works_unlocked: false,
        columns: vec![
            ColumnDef { name: "host_name".into(), kind: ColumnStorageKind::Backend, value_kind: ValueKind::String },
            ColumnDef { name: "state".into(), kind: ColumnStorageKind::Backend, value_kind: ValueKind::Integer },
        ],
    }
}

fn hosts_columns() -> Vec<RequestedColumn> {
    vec![
        RequestedColumn { name: "name".into(), storage_kind: ColumnStorageKind::Backend, value_kind: ValueKind::String },
        RequestedColumn { name: "state".into(), storage_kind: ColumnStorageKind::Backend, value_kind: ValueKind::Integer },
    ]
}

fn base_request(table: &str) -> Request {
    Request {
        table: table.into(),
        columns: vec![],
        filter: Filter::None,
        stats: vec![],
        stats_grouped: None,
        sort: vec![],
        limit: None,
        offset: 0,
        backends: HashSet::new(),
        wait_trigger: None,
        output_format: OutputFormat::Json,
        fixed16: true,
        columns_header: None,
        auth_user: None,
        send_stats_data: false,
    }
}

/// Scenario 1: basic filter+sort+limit, fixed-16, plain JSON.
#[tokio::test]
async fn scenario1_basic_filter_sort_limit() {
    let registry = PeerRegistry::new();
    let rows = vec![
        DataRow::new(vec![DataValue::String("a".into()), DataValue::Int(0)]),
        DataRow::new(vec![DataValue::String("b".into()), DataValue::Int(1)]),
        DataRow::new(vec![DataValue::String("c".into()), DataValue::Int(0)]),
        DataRow::new(vec![DataValue::String("d".into()), DataValue::Int(0)]),
    ];
    registry.register(peer_with_rows("p1", "hosts", rows));
    let catalog = StaticCatalog::new().with_table(hosts_table());

    let mut req = base_request("hosts");
    req.columns = hosts_columns();
    req.filter = Filter::Predicate(Predicate { column: "state".into(), op: CompareOp::Eq, value: DataValue::Int(0) });
    req.sort = vec![SortField { column_index: 0, direction: Direction::Asc, group: false }];
    req.limit = Some(2);

    let metrics = Metrics::new();
    let outcome = execute_query(req.clone(), &registry, &catalog, None, Arc::new(ProxyConfig::default()), Arc::new(AtomicBool::new(false)), &metrics)
        .await
        .unwrap();

    let mut buf = Vec::new();
    write_response(&mut buf, &req, &outcome.response, &outcome.table, outcome.result_total, &metrics).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let mut lines = text.splitn(2, '\n');
    let header = lines.next().unwrap();
    let body = lines.next().unwrap();

    assert_eq!(body, "[[\"a\",0],[\"c\",0]]\n");
    assert_eq!(header, format!("200 {:>11}", body.len()));
}

/// Scenario 2: wrapped JSON with one failed peer.
#[tokio::test]
async fn scenario2_wrapped_json_with_failed_peer() {
    let registry = PeerRegistry::new();
    registry.register(offline_peer("X"));
    registry.register(peer_with_rows("Y", "hosts", vec![DataRow::new(vec![DataValue::String("h1".into()), DataValue::Int(0)])]));
    let catalog = StaticCatalog::new().with_table(hosts_table());

    let mut req = base_request("hosts");
    req.columns = hosts_columns();
    req.output_format = OutputFormat::WrappedJson;
    req.fixed16 = false;

    let metrics = Metrics::new();
    let outcome = execute_query(req.clone(), &registry, &catalog, None, Arc::new(ProxyConfig::default()), Arc::new(AtomicBool::new(false)), &metrics)
        .await
        .unwrap();

    assert_eq!(outcome.response.code, 200);
    let mut buf = Vec::new();
    write_response(&mut buf, &req, &outcome.response, &outcome.table, outcome.result_total, &metrics).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&buf[..buf.len() - 1]).unwrap();

    assert_eq!(value["data"], serde_json::json!([["h1", 0]]));
    assert!(value["failed"]["X"].as_str().is_some());
    assert_eq!(value["total_count"], 1);
}

/// Scenario 3: all peers fail, plain JSON yields 502 with the first
/// requested backend's message.
#[tokio::test]
async fn scenario3_all_peers_failed_plain_json() {
    let registry = PeerRegistry::new();
    for id in ["A", "B", "C"] {
        registry.register(offline_peer(id));
    }
    let catalog = StaticCatalog::new().with_table(hosts_table());

    let mut req = base_request("hosts");
    req.columns = hosts_columns();
    req.fixed16 = false;

    let metrics = Metrics::new();
    let outcome = execute_query(req.clone(), &registry, &catalog, None, Arc::new(ProxyConfig::default()), Arc::new(AtomicBool::new(false)), &metrics)
        .await
        .unwrap();

    assert_eq!(outcome.response.code, 502);
    let mut buf = Vec::new();
    write_response(&mut buf, &req, &outcome.response, &outcome.table, outcome.result_total, &metrics).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.contains("no data store for peer A") || text.contains("no dataset for peer A"));
}

/// Scenario 4: stats with grouping by host_name.
#[tokio::test]
async fn scenario4_stats_with_grouping() {
    let registry = PeerRegistry::new();
    let rows = vec![
        DataRow::new(vec![DataValue::String("h1".into()), DataValue::Int(0)]),
        DataRow::new(vec![DataValue::String("h1".into()), DataValue::Int(0)]),
        DataRow::new(vec![DataValue::String("h1".into()), DataValue::Int(2)]),
        DataRow::new(vec![DataValue::String("h2".into()), DataValue::Int(0)]),
    ];
    registry.register(peer_with_rows("p1", "services", rows));
    let catalog = StaticCatalog::new().with_table(services_table());

    let mut req = base_request("services");
    req.columns = vec![RequestedColumn { name: "host_name".into(), storage_kind: ColumnStorageKind::Backend, value_kind: ValueKind::String }];
    req.stats = vec![
        StatsSpec { kind: StatsKind::Counter, predicate: Filter::Predicate(Predicate { column: "state".into(), op: CompareOp::Eq, value: DataValue::Int(0) }), column: None },
        StatsSpec { kind: StatsKind::Counter, predicate: Filter::Predicate(Predicate { column: "state".into(), op: CompareOp::Eq, value: DataValue::Int(2) }), column: None },
    ];
    req.fixed16 = false;

    let metrics = Metrics::new();
    let outcome = execute_query(req.clone(), &registry, &catalog, None, Arc::new(ProxyConfig::default()), Arc::new(AtomicBool::new(false)), &metrics)
        .await
        .unwrap();

    assert_eq!(outcome.result_total, 2);
    let rows: Vec<_> = outcome.response.result().iter().map(|r| r.to_json_array()).collect();
    assert_eq!(rows, vec![serde_json::json!(["h1", 2.0, 1.0]), serde_json::json!(["h2", 1.0, 0.0])]);
}

/// Scenario 5: average stats, with and without `sendStatsData`.
#[tokio::test]
async fn scenario5_average() {
    let registry = PeerRegistry::new();
    let rows = vec![
        DataRow::new(vec![DataValue::Float(1.0)]),
        DataRow::new(vec![DataValue::Float(3.0)]),
        DataRow::new(vec![DataValue::Float(5.0)]),
    ];
    let table = TableDef {
        name: "services".into(),
        virtual_table: false,
        passthrough_only: false,
        works_unlocked: false,
        columns: vec![ColumnDef { name: "check_latency".into(), kind: ColumnStorageKind::Backend, value_kind: ValueKind::Float }],
    };
    registry.register(peer_with_rows("p1", "services", rows));
    let catalog = StaticCatalog::new().with_table(table);

    let mut req = base_request("services");
    req.columns = vec![];
    req.stats = vec![StatsSpec { kind: StatsKind::Average, predicate: Filter::None, column: Some("check_latency".into()) }];
    req.fixed16 = false;

    let metrics = Metrics::new();
    let outcome = execute_query(req.clone(), &registry, &catalog, None, Arc::new(ProxyConfig::default()), Arc::new(AtomicBool::new(false)), &metrics)
        .await
        .unwrap();
    let rows: Vec<_> = outcome.response.result().iter().map(|r| r.to_json_array()).collect();
    assert_eq!(rows, vec![serde_json::json!([3.0])]);
}

/// Scenario 5b: same average query with `sendStatsData=true` returns the
/// raw `[sum, count]` pair instead of the finalized average (§8).
#[tokio::test]
async fn scenario5b_average_with_send_stats_data() {
    let registry = PeerRegistry::new();
    let rows = vec![
        DataRow::new(vec![DataValue::Float(1.0)]),
        DataRow::new(vec![DataValue::Float(3.0)]),
        DataRow::new(vec![DataValue::Float(5.0)]),
    ];
    let table = TableDef {
        name: "services".into(),
        virtual_table: false,
        passthrough_only: false,
        works_unlocked: false,
        columns: vec![ColumnDef { name: "check_latency".into(), kind: ColumnStorageKind::Backend, value_kind: ValueKind::Float }],
    };
    registry.register(peer_with_rows("p1", "services", rows));
    let catalog = StaticCatalog::new().with_table(table);

    let mut req = base_request("services");
    req.columns = vec![];
    req.stats = vec![StatsSpec { kind: StatsKind::Average, predicate: Filter::None, column: Some("check_latency".into()) }];
    req.fixed16 = false;
    req.send_stats_data = true;

    let metrics = Metrics::new();
    let outcome = execute_query(req.clone(), &registry, &catalog, None, Arc::new(ProxyConfig::default()), Arc::new(AtomicBool::new(false)), &metrics)
        .await
        .unwrap();
    let rows: Vec<_> = outcome.response.result().iter().map(|r| r.to_json_array()).collect();
    assert_eq!(rows, vec![serde_json::json!([[9.0, 3]])]);
}

/// Scenario 6: cancellation mid-scan yields no rows from the cancelled peer.
#[tokio::test]
async fn scenario6_cancellation_yields_no_rows() {
    let registry = PeerRegistry::new();
    let rows: Vec<DataRow> = (0..200_000).map(|i| DataRow::new(vec![DataValue::String(format!("h{i}")), DataValue::Int(0)])).collect();
    registry.register(peer_with_rows("p1", "hosts", rows));
    let catalog = StaticCatalog::new().with_table(hosts_table());

    let mut req = base_request("hosts");
    req.columns = hosts_columns();
    req.fixed16 = false;

    let mut config = ProxyConfig::default();
    config.row_context_check = 15_000;
    let cancelled = Arc::new(AtomicBool::new(true));
    let metrics = Metrics::new();

    let outcome = execute_query(req, &registry, &catalog, None, Arc::new(config), cancelled, &metrics).await.unwrap();
    assert!(outcome.response.result().is_empty());
}
