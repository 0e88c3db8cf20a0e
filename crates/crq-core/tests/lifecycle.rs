//! End-to-end entity lifecycle against in-memory collaborators: save
//! dispatch, relationship synchronization, and the status state machine.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crq_core::{
    Backend, ChangeApi, ChangeError, ChangeRequest, ConfigItemLookup, ConfigItemRef, ManualClock,
    PollWait, TransportError, Worklog,
};
use serde_json::{Map, Value, json};

const CHANGE_ID: &str = "CRQ000000001234";

/// Change API fake: records every request and replays a scripted
/// sequence of statuses on fetch.
#[derive(Default)]
struct FakeChangeApi {
    create_bodies: Mutex<Vec<Map<String, Value>>>,
    update_bodies: Mutex<Vec<(String, Map<String, Value>)>>,
    status_script: Mutex<VecDeque<&'static str>>,
    last_status: Mutex<String>,
    fetches: Mutex<u32>,
    worklogs: Mutex<Vec<(String, Worklog)>>,
}

impl FakeChangeApi {
    fn with_statuses(script: &[&'static str]) -> Self {
        Self {
            status_script: Mutex::new(script.iter().copied().collect()),
            last_status: Mutex::new("Draft".to_string()),
            ..Self::default()
        }
    }

    fn creates(&self) -> usize {
        self.create_bodies.lock().expect("lock").len()
    }

    fn updates(&self) -> Vec<(String, Map<String, Value>)> {
        self.update_bodies.lock().expect("lock").clone()
    }

    fn fetch_count(&self) -> u32 {
        *self.fetches.lock().expect("lock")
    }
}

impl ChangeApi for FakeChangeApi {
    fn create(&self, body: &Map<String, Value>) -> Result<String, TransportError> {
        self.create_bodies.lock().expect("lock").push(body.clone());
        Ok(CHANGE_ID.to_string())
    }

    fn update(&self, change_id: &str, body: &Map<String, Value>) -> Result<(), TransportError> {
        self.update_bodies
            .lock()
            .expect("lock")
            .push((change_id.to_string(), body.clone()));
        Ok(())
    }

    fn fetch(&self, change_id: &str) -> Result<Option<Map<String, Value>>, TransportError> {
        *self.fetches.lock().expect("lock") += 1;

        let mut last = self.last_status.lock().expect("lock");
        if let Some(next) = self.status_script.lock().expect("lock").pop_front() {
            *last = next.to_string();
        }

        let mut raw = Map::new();
        raw.insert("changeId".to_string(), Value::String(change_id.to_string()));
        raw.insert("statusString".to_string(), Value::String(last.clone()));
        Ok(Some(raw))
    }

    fn fetch_by_ticket_number(
        &self,
        _ticket_number: &str,
    ) -> Result<Option<Value>, TransportError> {
        Ok(None)
    }

    fn add_worklog(&self, change_id: &str, worklog: &Worklog) -> Result<Value, TransportError> {
        self.worklogs
            .lock()
            .expect("lock")
            .push((change_id.to_string(), worklog.clone()));
        Ok(json!({ "workLogId": "WLG000000000001" }))
    }
}

/// Config-item fake: alias-to-instance maps plus a link recorder.
#[derive(Default)]
struct FakeConfigItems {
    services: HashMap<String, String>,
    systems: HashMap<String, String>,
    links: Mutex<Vec<(String, String)>>,
}

impl FakeConfigItems {
    fn linked(&self) -> Vec<(String, String)> {
        self.links.lock().expect("lock").clone()
    }
}

impl ConfigItemLookup for FakeConfigItems {
    fn business_service(
        &self,
        company: &str,
        _name_matcher: &str,
    ) -> Result<Option<ConfigItemRef>, TransportError> {
        Ok(self.services.get(company).map(|id| ConfigItemRef {
            instance_id: id.clone(),
            name: None,
        }))
    }

    fn computer_system_by_system_id(
        &self,
        system_id: &str,
    ) -> Result<Option<ConfigItemRef>, TransportError> {
        Ok(self.systems.get(system_id).map(|id| ConfigItemRef {
            instance_id: id.clone(),
            name: None,
        }))
    }

    fn link_instance(&self, change_id: &str, instance_id: &str) -> Result<(), TransportError> {
        self.links
            .lock()
            .expect("lock")
            .push((change_id.to_string(), instance_id.to_string()));
        Ok(())
    }
}

fn backend(changes: &Arc<FakeChangeApi>, config_items: &Arc<FakeConfigItems>) -> Backend {
    Backend::new(
        Arc::clone(changes) as Arc<dyn ChangeApi>,
        Arc::clone(config_items) as Arc<dyn ConfigItemLookup>,
    )
}

fn existing(status: &str, changes: &Arc<FakeChangeApi>, items: &Arc<FakeConfigItems>) -> ChangeRequest {
    let mut raw = Map::new();
    raw.insert("changeId".to_string(), Value::String(CHANGE_ID.to_string()));
    raw.insert("statusString".to_string(), Value::String(status.to_string()));
    ChangeRequest::from_response(raw).with_backend(backend(changes, items))
}

fn wait(timeout: u64, interval: u64) -> PollWait {
    PollWait {
        timeout: Duration::from_secs(timeout),
        interval: Duration::from_secs(interval),
    }
}

#[test]
fn first_save_creates_then_updates_only_changed_fields() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems::default());
    let mut cr = ChangeRequest::new().with_backend(backend(&changes, &items));

    cr.set("summary", "swap core switch").expect("set");
    cr.save().expect("create");

    assert_eq!(cr.change_id().as_deref(), Some(CHANGE_ID));
    assert_eq!(changes.creates(), 1);
    assert!(changes.updates().is_empty());
    assert!(cr.changes().is_empty());

    {
        let create_bodies = changes.create_bodies.lock().expect("lock");
        let created = &create_bodies[0];
        assert_eq!(created.get("summary"), Some(&json!("swap core switch")));
        // Suffix-normalized defaults ride along on create.
        assert_eq!(created.get("status"), Some(&json!("Draft")));
        assert!(!created.contains_key("statusString"));
    }

    // Nothing staged: no request at all.
    cr.save().expect("no-op save");
    assert_eq!(changes.creates(), 1);
    assert!(changes.updates().is_empty());

    // A mutation flows into an update carrying only the change.
    cr.set("impact", "widespread").expect("set");
    cr.save().expect("update");

    let updates = changes.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, CHANGE_ID);
    assert_eq!(
        updates[0].1,
        serde_json::from_value::<Map<String, Value>>(json!({
            "impact": "1-Extensive/Widespread",
        }))
        .expect("map")
    );
}

#[test]
fn relationships_link_after_the_id_is_assigned() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems {
        services: HashMap::from([("ABC_DE".to_string(), "OI-1".to_string())]),
        ..FakeConfigItems::default()
    });
    let mut cr = ChangeRequest::new().with_backend(backend(&changes, &items));

    cr.set("businessServices", vec!["ABC_DE".to_string()])
        .expect("stage");
    cr.save().expect("create");

    assert_eq!(items.linked(), vec![(CHANGE_ID.to_string(), "OI-1".to_string())]);
    assert!(cr.changes().is_empty(), "overlay commits after linking");
}

#[test]
fn unresolvable_aliases_are_skipped_not_fatal() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems {
        services: HashMap::from([("ABC_DE".to_string(), "OI-1".to_string())]),
        systems: HashMap::from([("abcdeapp1".to_string(), "OI-2".to_string())]),
        ..FakeConfigItems::default()
    });
    let mut cr = ChangeRequest::new().with_backend(backend(&changes, &items));

    cr.set(
        "businessServices",
        vec!["ABC_DE".to_string(), "NO_SUCH".to_string()],
    )
    .expect("stage");
    cr.set("computerSystems", vec!["abcdeapp1".to_string(), "ghost".to_string()])
        .expect("stage");
    cr.set("instanceIds", vec!["OI-9".to_string()])
        .expect("stage");

    cr.save().expect("save survives bad aliases");

    let linked: Vec<String> = items.linked().into_iter().map(|(_, id)| id).collect();
    assert_eq!(linked, vec!["OI-9", "OI-1", "OI-2"]);
}

#[test]
fn resolved_instances_deduplicate_against_staged_ids() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems {
        services: HashMap::from([("ABC_DE".to_string(), "OI-1".to_string())]),
        ..FakeConfigItems::default()
    });
    let mut cr = ChangeRequest::new().with_backend(backend(&changes, &items));

    cr.set("businessServices", vec!["ABC_DE".to_string()])
        .expect("stage");
    cr.set("instanceIds", vec!["OI-1".to_string()])
        .expect("stage");
    cr.save().expect("save");

    assert_eq!(items.linked(), vec![(CHANGE_ID.to_string(), "OI-1".to_string())]);
}

#[test]
fn guard_violation_names_the_offending_status() {
    let changes = Arc::new(FakeChangeApi::with_statuses(&["Closed"]));
    let items = Arc::new(FakeConfigItems::default());
    let mut cr = existing("Closed", &changes, &items);

    let result = cr.to_draft(wait(5, 5));
    let Err(ChangeError::GuardViolation {
        current,
        target,
        allowed,
    }) = result
    else {
        panic!("expected a guard violation");
    };

    assert_eq!(current, "Closed");
    assert_eq!(target, "Draft");
    assert_eq!(allowed, "Cancelled");
    assert!(changes.updates().is_empty(), "no status change submitted");
}

#[test]
fn transition_is_idempotent_on_cached_status() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems::default());
    let mut cr = existing("Scheduled", &changes, &items);

    cr.to_planning_in_progress(wait(5, 5)).expect("no-op");

    assert_eq!(changes.fetch_count(), 0);
    assert!(changes.updates().is_empty());
}

#[test]
fn transition_is_idempotent_on_fresh_status() {
    // The cached status is stale; the probe discovers the record already
    // landed in an end status.
    let changes = Arc::new(FakeChangeApi::with_statuses(&["Scheduled"]));
    let items = Arc::new(FakeConfigItems::default());
    let mut cr = existing("Draft", &changes, &items);

    cr.to_planning_in_progress(wait(5, 5)).expect("no-op");

    assert_eq!(changes.fetch_count(), 1);
    assert!(changes.updates().is_empty());
}

#[test]
fn transition_times_out_after_a_single_interval() {
    let changes = Arc::new(FakeChangeApi::with_statuses(&["Draft"]));
    let items = Arc::new(FakeConfigItems::default());
    let clock = Arc::new(ManualClock::default());
    let mut cr = existing("Draft", &changes, &items).with_clock(Arc::clone(&clock) as _);

    let result = cr.to_planning_in_progress(wait(5, 5));
    let Err(ChangeError::TransitionTimeout { change_id, target }) = result else {
        panic!("expected a timeout");
    };

    assert_eq!(change_id, CHANGE_ID);
    assert_eq!(target, "Request For Authorization");
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);

    // The staged status made it to the server before polling began.
    let updates = changes.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0].1.get("status"),
        Some(&json!("Request For Authorization"))
    );
}

#[test]
fn transition_polls_until_an_end_status() {
    let changes = Arc::new(FakeChangeApi::with_statuses(&[
        "Draft",                // idempotence probe
        "Request For Authorization", // first poll
        "Planning In Progress", // second poll
    ]));
    let items = Arc::new(FakeConfigItems::default());
    let clock = Arc::new(ManualClock::default());
    let mut cr = existing("Draft", &changes, &items).with_clock(Arc::clone(&clock) as _);

    cr.to_planning_in_progress(wait(600, 5)).expect("transition");

    assert_eq!(cr.get("status").expect("status").as_str(), Some("Planning In Progress"));
    assert_eq!(clock.sleeps().len(), 1);
}

#[test]
fn implementation_stamps_the_actual_start_as_a_second_save() {
    let changes = Arc::new(FakeChangeApi::with_statuses(&[
        "Scheduled",
        "Implementation In Progress",
    ]));
    let items = Arc::new(FakeConfigItems::default());
    let clock = Arc::new(ManualClock::default());
    let mut cr = existing("Scheduled", &changes, &items).with_clock(Arc::clone(&clock) as _);

    cr.to_implementation_in_progress(wait(600, 5))
        .expect("transition");

    let updates = changes.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(
        updates[0].1.get("status"),
        Some(&json!("Implementation In Progress"))
    );
    assert!(updates[1].1.contains_key("actualStartDate"));
}

#[test]
fn scheduling_requires_both_dates_before_any_request() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems::default());
    let mut cr = existing("Planning In Progress", &changes, &items);

    cr.set("scheduledStartDate", "2024-06-01 09:00:00")
        .expect("set");
    let result = cr.to_scheduled(wait(5, 5));

    assert!(matches!(result, Err(ChangeError::MissingSchedule)));
    assert_eq!(changes.fetch_count(), 0);
    assert!(changes.updates().is_empty());
}

#[test]
fn completion_requires_an_actual_start() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems::default());
    let mut cr = existing("Implementation In Progress", &changes, &items);

    let result = cr.to_completed(wait(5, 5));
    assert!(matches!(result, Err(ChangeError::MissingActualStart)));
    assert_eq!(changes.fetch_count(), 0);
}

#[test]
fn completion_stamps_a_missing_actual_end_first() {
    let changes = Arc::new(FakeChangeApi::with_statuses(&[
        "Implementation In Progress",
        "Completed",
    ]));
    let items = Arc::new(FakeConfigItems::default());
    let clock = Arc::new(ManualClock::default());

    let mut raw = Map::new();
    raw.insert("changeId".to_string(), Value::String(CHANGE_ID.to_string()));
    raw.insert(
        "statusString".to_string(),
        Value::String("Implementation In Progress".to_string()),
    );
    raw.insert("actualStartDate".to_string(), json!(1_709_294_400));
    let mut cr = ChangeRequest::from_response(raw)
        .with_backend(backend(&changes, &items))
        .with_clock(Arc::clone(&clock) as _);

    cr.to_completed(wait(600, 5)).expect("transition");

    let updates = changes.updates();
    assert_eq!(updates.len(), 2);
    assert!(updates[0].1.contains_key("actualEndDate"));
    assert_eq!(updates[1].1.get("status"), Some(&json!("Completed")));
}

#[test]
fn save_without_a_backend_is_rejected() {
    let mut cr = ChangeRequest::new();
    cr.set("summary", "unbound").expect("set");
    assert!(matches!(cr.save(), Err(ChangeError::NoClientBound)));
}

#[test]
fn refresh_before_create_is_rejected() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems::default());
    let mut cr = ChangeRequest::new().with_backend(backend(&changes, &items));

    assert!(matches!(
        cr.refresh(true),
        Err(ChangeError::NotYetCreated { .. })
    ));
}

#[test]
fn worklogs_delegate_without_touching_the_overlay() {
    let changes = Arc::new(FakeChangeApi::default());
    let items = Arc::new(FakeConfigItems::default());
    let cr = existing("Draft", &changes, &items);

    cr.add_worklog(&Worklog::with_summary("maintenance window opened"))
        .expect("worklog");

    let worklogs = changes.worklogs.lock().expect("lock");
    assert_eq!(worklogs.len(), 1);
    assert_eq!(worklogs[0].0, CHANGE_ID);
    assert!(cr.changes().is_empty());
}
