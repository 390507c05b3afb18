//! C1 Peer Selector (`spec.md` §4.1).

use std::sync::Arc;

use crate::peer::{NodeAccessor, Peer, PeerId, PeerRegistry};
use crate::request::Request;

pub struct SelectionResult {
    pub selected: Vec<Arc<Peer>>,
    pub spin_up_peers: Vec<Arc<Peer>>,
    /// Peers that matched every selection criterion but are marked
    /// `isOnline() == false` (§6), excluded from `selected` so the caller
    /// can record a `FailureReason::Offline` without a failed scan attempt.
    pub offline_peers: Vec<PeerId>,
}

const METADATA_TABLES: &[&str] = &["tables", "columns"];

/// Iterates peers in catalog order, keeping `p` iff:
/// (a) `p.id` is requested (or `backends` is empty, meaning all),
/// (b) no node accessor is configured, or it claims `p` as locally owned,
/// (c) `p` lacks the multi-backend aggregator flag,
/// (d) `p.is_online()` (§6) — an offline peer is reported as failed rather
/// than scanned.
///
/// For the metadata tables `tables`/`columns`, only the first surviving
/// peer is kept — metadata is uniform across peers (§4.1, preserved as-is
/// per the Open Question in `spec.md` §9: no fallback if that peer is
/// offline).
pub fn select_peers(
    registry: &PeerRegistry,
    request: &Request,
    node_accessor: Option<&dyn NodeAccessor>,
    table_is_virtual: impl Fn(&str) -> bool,
) -> SelectionResult {
    let metadata_table = METADATA_TABLES.contains(&request.table.as_str());
    let mut selected = Vec::new();
    let mut spin_up_peers = Vec::new();
    let mut offline_peers = Vec::new();

    for peer in registry.ordered() {
        if !request.backends.is_empty() && !request.backends.contains(&peer.id) {
            continue;
        }
        if let Some(accessor) = node_accessor {
            if !accessor.is_our_backend(&peer.id) {
                continue;
            }
        }
        if peer.flags.multi_backend {
            continue;
        }
        if !peer.is_online() {
            offline_peers.push(peer.id.clone());
            continue;
        }

        if peer.is_idling() && !table_is_virtual(&request.table) {
            spin_up_peers.push(peer.clone());
        }

        selected.push(peer);
        if metadata_table {
            break;
        }
    }

    SelectionResult { selected, spin_up_peers, offline_peers }
}

pub fn requested_backend_ids(request: &Request, registry: &PeerRegistry) -> Vec<PeerId> {
    if request.backends.is_empty() {
        registry.ordered().into_iter().map(|p| p.id.clone()).collect()
    } else {
        request.backends.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::peer::{PeerBackend, PeerFlags};

    struct NoopBackend;
    #[async_trait]
    impl PeerBackend for NoopBackend {
        async fn wait_condition(&self, _r: &Request) -> Result<(), String> { Ok(()) }
        async fn resume_from_idle(&self) -> Result<(), String> { Ok(()) }
        async fn pass_through_query(&self, _r: &Request) -> Result<serde_json::Value, String> { Ok(serde_json::Value::Null) }
    }

    fn registry_with(names: &[&str], multi_backend_at: Option<usize>) -> PeerRegistry {
        let reg = PeerRegistry::new();
        for (i, name) in names.iter().enumerate() {
            let mut flags = PeerFlags::default();
            if Some(i) == multi_backend_at {
                flags.multi_backend = true;
            }
            reg.register(Arc::new(Peer::new(PeerId::from(*name), flags, Arc::new(NoopBackend))));
        }
        reg
    }

    fn base_request(table: &str) -> Request {
        use std::collections::HashSet;
        Request {
            table: table.into(),
            columns: vec![],
            filter: crate::request::Filter::None,
            stats: vec![],
            stats_grouped: None,
            sort: vec![],
            limit: None,
            offset: 0,
            backends: HashSet::new(),
            wait_trigger: None,
            output_format: crate::request::OutputFormat::Json,
            fixed16: false,
            columns_header: None,
            auth_user: None,
            send_stats_data: false,
        }
    }

    #[test]
    fn keeps_catalog_order_and_skips_multi_backend() {
        let reg = registry_with(&["a", "b", "c"], Some(1));
        let req = base_request("hosts");
        let result = select_peers(&reg, &req, None, |_| false);
        let ids: Vec<_> = result.selected.iter().map(|p| p.id.0.clone()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn metadata_table_keeps_only_first_peer() {
        let reg = registry_with(&["a", "b", "c"], None);
        let req = base_request("tables");
        let result = select_peers(&reg, &req, None, |_| false);
        assert_eq!(result.selected.len(), 1);
        assert_eq!(result.selected[0].id.0, "a");
    }

    #[test]
    fn idling_peer_on_non_virtual_table_is_queued_for_spin_up() {
        let reg = registry_with(&["a"], None);
        reg.get(&PeerId::from("a")).unwrap().set_idling(true);
        let req = base_request("hosts");
        let result = select_peers(&reg, &req, None, |_| false);
        assert_eq!(result.spin_up_peers.len(), 1);
    }

    #[test]
    fn idling_peer_on_virtual_table_is_not_queued() {
        let reg = registry_with(&["a"], None);
        reg.get(&PeerId::from("a")).unwrap().set_idling(true);
        let req = base_request("sites");
        let result = select_peers(&reg, &req, None, |t| t == "sites");
        assert!(result.spin_up_peers.is_empty());
    }

    #[test]
    fn offline_peer_is_excluded_from_selected_and_reported_separately() {
        let reg = registry_with(&["a", "b"], None);
        reg.get(&PeerId::from("a")).unwrap().set_online(false);
        let req = base_request("hosts");
        let result = select_peers(&reg, &req, None, |_| false);
        let ids: Vec<_> = result.selected.iter().map(|p| p.id.0.clone()).collect();
        assert_eq!(ids, vec!["b"]);
        assert_eq!(result.offline_peers, vec![PeerId::from("a")]);
    }
}
