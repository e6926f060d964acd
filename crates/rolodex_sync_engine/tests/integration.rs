//! End-to-end cycles against an in-memory server over the SQLite store.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rolodex_core::{Contact, ContactRepository, Database, Group, GroupRepository};
use rolodex_sync_engine::{
    DatabaseStore, EngineStores, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer,
    NullDiagnostics, StaticTokenSource, SyncConfig, SyncOrchestrator,
};
use rolodex_sync_protocol::{
    format_instant, parse_instant, ContactChange, GroupChange, PullResponse, PushRequest,
    PushResponse, RecordPayload,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A contacts server kept entirely in memory.
///
/// Applies every pushed item, stamps it with the arrival instant, and
/// serves deltas strictly newer than the requested watermark.
#[derive(Default)]
struct InMemoryServer {
    contacts: Mutex<HashMap<String, (ContactChange, DateTime<Utc>)>>,
    groups: Mutex<HashMap<String, (GroupChange, DateTime<Utc>)>>,
    offline: AtomicBool,
}

impl InMemoryServer {
    fn new() -> Self {
        Self::default()
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn seed_contact(&self, change: ContactChange) {
        self.contacts
            .lock()
            .insert(change.id.clone(), (change, Utc::now()));
    }

    fn contact(&self, id: &str) -> Option<ContactChange> {
        self.contacts.lock().get(id).map(|(change, _)| change.clone())
    }

    fn contact_count(&self) -> usize {
        self.contacts.lock().len()
    }

    fn handle_push(&self, request: PushRequest) -> PushResponse {
        let now = Utc::now();
        let mut applied = Vec::new();
        for item in request.batch {
            match item.payload {
                RecordPayload::Contact(change) => {
                    self.contacts
                        .lock()
                        .insert(change.id.clone(), (change, now));
                }
                RecordPayload::Group(change) => {
                    self.groups.lock().insert(change.id.clone(), (change, now));
                }
            }
            applied.push(item.id);
        }
        PushResponse::applied(applied)
    }

    fn handle_pull(&self, since: Option<DateTime<Utc>>) -> PullResponse {
        let newer = |received: &DateTime<Utc>| since.is_none_or(|s| *received > s);
        PullResponse {
            server_time: format_instant(Utc::now()),
            contacts: self
                .contacts
                .lock()
                .values()
                .filter(|(_, received)| newer(received))
                .map(|(change, _)| change.clone())
                .collect(),
            groups: self
                .groups
                .lock()
                .values()
                .filter(|(_, received)| newer(received))
                .map(|(change, _)| change.clone())
                .collect(),
        }
    }
}

impl LoopbackServer for InMemoryServer {
    fn handle(
        &self,
        method: &str,
        path_and_query: &str,
        body: &[u8],
    ) -> Result<HttpResponse, String> {
        if self.offline.load(Ordering::SeqCst) {
            return Err("connection refused".into());
        }
        match (method, path_and_query) {
            ("POST", "/sync/push") => {
                let request: PushRequest =
                    serde_json::from_slice(body).map_err(|e| e.to_string())?;
                let response = self.handle_push(request);
                Ok(HttpResponse::ok(
                    serde_json::to_vec(&response).map_err(|e| e.to_string())?,
                ))
            }
            ("GET", path) if path.starts_with("/sync/pull") => {
                let since = path
                    .split_once("since=")
                    .map(|(_, raw)| raw.replace("%3A", ":").replace("%2B", "+"))
                    .as_deref()
                    .and_then(parse_instant);
                let response = self.handle_pull(since);
                Ok(HttpResponse::ok(
                    serde_json::to_vec(&response).map_err(|e| e.to_string())?,
                ))
            }
            _ => Ok(HttpResponse {
                status: 404,
                body: Vec::new(),
            }),
        }
    }
}

struct Client {
    db: Arc<Database>,
    orchestrator: SyncOrchestrator<HttpTransport<LoopbackClient<Arc<InMemoryServer>>>>,
}

impl Client {
    fn new(server: &Arc<InMemoryServer>) -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(DatabaseStore::new(db.clone()));
        let transport = HttpTransport::new(
            "https://rolodex.test",
            LoopbackClient::new(server.clone()),
        );
        let orchestrator = SyncOrchestrator::new(
            SyncConfig::new("https://rolodex.test").with_batch_size(2),
            transport,
            Arc::new(StaticTokenSource::with_token("integration-token")),
            EngineStores::from_shared(store),
            Arc::new(NullDiagnostics),
        );
        Self { db, orchestrator }
    }

    fn contacts(&self) -> ContactRepository<'_> {
        ContactRepository::new(self.db.as_ref())
    }

    fn groups(&self) -> GroupRepository<'_> {
        GroupRepository::new(self.db.as_ref())
    }

    fn queued_count(&self) -> i64 {
        self.db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM outbox WHERE status IN ('queued', 'error')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap()
    }
}

#[test]
fn full_cycle_pushes_local_edits() {
    let server = Arc::new(InMemoryServer::new());
    let client = Client::new(&server);

    let ada = Contact::new("u1", "Ada", "Lovelace");
    let grace = Contact::new("u1", "Grace", "Hopper");
    client.contacts().save(&ada).unwrap();
    client.contacts().save(&grace).unwrap();
    let mut family = Group::new("u1", "Family");
    family.member_ids.push(ada.id);
    client.groups().save(&family).unwrap();

    let outcome = client.orchestrator.run_cycle().unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.push.attempted, 3);
    assert_eq!(outcome.push.applied, 3);
    assert_eq!(client.queued_count(), 0);
    assert_eq!(server.contact_count(), 2);
    assert_eq!(
        server.contact(&ada.id.as_str()).unwrap().given_name,
        "Ada"
    );
    assert!(outcome.watermark.is_some());
}

#[test]
fn bidirectional_cycle_merges_remote_changes() {
    let server = Arc::new(InMemoryServer::new());
    let client = Client::new(&server);

    // Another device already uploaded a contact.
    let remote = Contact::new("u1", "Margaret", "Hamilton");
    server.seed_contact(remote.to_change());

    let local = Contact::new("u1", "Ada", "Lovelace");
    client.contacts().save(&local).unwrap();

    let outcome = client.orchestrator.run_cycle().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.push.applied, 1);

    // The remote contact landed locally, the local one on the server.
    assert!(client.contacts().get(&remote.id).unwrap().is_some());
    assert!(server.contact(&local.id.as_str()).is_some());
    assert_eq!(client.contacts().list().unwrap().len(), 2);
}

#[test]
fn echoed_pushes_do_not_clobber_local_state() {
    let server = Arc::new(InMemoryServer::new());
    let client = Client::new(&server);

    let ada = Contact::new("u1", "Ada", "Lovelace");
    client.contacts().save(&ada).unwrap();

    // First cycle pushes the contact; the pull echoes it back with the
    // same timestamp, which must tie-break in favor of local state.
    let first = client.orchestrator.run_cycle().unwrap();
    assert!(first.success);
    let after_first = client.contacts().get(&ada.id).unwrap().unwrap();
    assert_eq!(after_first.given_name, "Ada");

    // A quiet second cycle pulls nothing and keeps the watermark moving
    // forward only.
    let second = client.orchestrator.run_cycle().unwrap();
    assert!(second.success);
    assert_eq!(second.push.attempted, 0);
    assert_eq!(second.pull.total(), 0);
    assert!(second.watermark >= first.watermark);
}

#[test]
fn deletes_propagate_between_clients() {
    let server = Arc::new(InMemoryServer::new());
    let first = Client::new(&server);
    let second = Client::new(&server);

    let ada = Contact::new("u1", "Ada", "Lovelace");
    first.contacts().save(&ada).unwrap();
    first.orchestrator.run_cycle().unwrap();

    second.orchestrator.run_cycle().unwrap();
    assert!(second.contacts().get(&ada.id).unwrap().is_some());

    first.contacts().delete(&ada.id).unwrap();
    first.orchestrator.run_cycle().unwrap();

    let outcome = second.orchestrator.run_cycle().unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.pull.contacts_deleted, 1);
    assert!(second.contacts().get(&ada.id).unwrap().is_none());
}

#[test]
fn offline_cycle_fails_then_recovers() {
    let server = Arc::new(InMemoryServer::new());
    let client = Client::new(&server);

    let ada = Contact::new("u1", "Ada", "Lovelace");
    client.contacts().save(&ada).unwrap();

    server.set_offline(true);
    let failed = client.orchestrator.run_cycle().unwrap();
    assert!(!failed.success);
    assert!(failed.watermark.is_none());
    assert_eq!(client.queued_count(), 1);
    assert_eq!(server.contact_count(), 0);

    server.set_offline(false);
    let recovered = client.orchestrator.run_cycle().unwrap();
    assert!(recovered.success);
    assert_eq!(recovered.push.applied, 1);
    assert_eq!(client.queued_count(), 0);
    assert_eq!(server.contact_count(), 1);
    assert!(recovered.watermark.is_some());
}

#[test]
fn every_cycle_writes_one_log_entry() {
    let server = Arc::new(InMemoryServer::new());
    let client = Client::new(&server);

    server.set_offline(true);
    client.orchestrator.run_cycle().unwrap();
    server.set_offline(false);
    client.orchestrator.run_cycle().unwrap();

    let count: i64 = client
        .db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sync_log", [], |row| row.get(0))?))
        .unwrap();
    assert_eq!(count, 2);

    let failures: i64 = client
        .db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM sync_log WHERE success = 0",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(failures, 1);
}
