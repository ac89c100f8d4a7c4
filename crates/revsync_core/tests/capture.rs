//! Integration tests for change capture and the revision ledger.

use proptest::prelude::*;
use revsync_core::{
    ChangeQuery, CoreError, Database, Fields, Ordinal, ProfileId, ProjectId, RecordId, RecordKey,
    StoreConfig, TableName, TableRegistry,
};
use serde_json::json;
use std::collections::HashSet;

fn table(name: &str) -> TableName {
    TableName::new(name).unwrap()
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn tracked_db() -> Database {
    Database::open_tracked(StoreConfig::default(), TableRegistry::survey()).unwrap()
}

struct Survey {
    project: ProjectId,
    site: RecordId,
    event: RecordId,
    transect: RecordId,
}

fn seed_survey(db: &Database) -> Survey {
    let project = ProjectId::new();
    let site = RecordId::new();
    let event = RecordId::new();
    let transect = RecordId::new();
    db.write(None, |txn| {
        txn.insert(&table("project"), project.into(), fields(json!({ "name": "Reefs" })))?;
        txn.insert(
            &table("site"),
            site,
            fields(json!({ "project": project.to_string(), "name": "North" })),
        )?;
        txn.insert(
            &table("sample_event"),
            event,
            fields(json!({ "site": site.to_string() })),
        )?;
        txn.insert(
            &table("transect"),
            transect,
            fields(json!({ "sample_event": event.to_string(), "len": 50 })),
        )
    })
    .unwrap();
    Survey {
        project,
        site,
        event,
        transect,
    }
}

#[test]
fn create_writes_entry_and_touches_project() {
    let db = tracked_db();
    let survey = seed_survey(&db);
    let snapshot = db.snapshot();

    let transect = snapshot
        .revision(&RecordKey::new(table("transect"), survey.transect))
        .unwrap();
    assert_eq!(transect.project_id, Some(survey.project));
    assert!(!transect.deleted);

    let project = snapshot.revision(&RecordKey::project(survey.project)).unwrap();
    assert!(project.ordinal > transect.ordinal);
    assert_eq!(project.project_id, Some(survey.project));

    // project + (site, touch) + (event, touch) + (transect, touch)
    assert_eq!(snapshot.latest_ordinal(), Ordinal::new(7));
    assert_eq!(snapshot.ledger().len(), 4);
}

#[test]
fn update_rewrites_single_entry_with_higher_ordinal() {
    let db = tracked_db();
    let survey = seed_survey(&db);
    let key = RecordKey::new(table("site"), survey.site);
    let before = db.snapshot().revision(&key).cloned().unwrap();

    db.write(None, |txn| {
        txn.update(
            &table("site"),
            survey.site,
            fields(json!({ "project": survey.project.to_string(), "name": "North Reef" })),
        )
    })
    .unwrap();

    let snapshot = db.snapshot();
    let after = snapshot.revision(&key).unwrap();
    assert_eq!(after.revision_id, before.revision_id);
    assert!(after.ordinal > before.ordinal);
    let query = ChangeQuery::new([table("site")], Ordinal::ZERO).in_project(Some(survey.project));
    assert_eq!(snapshot.ledger().changes_since(&query).len(), 1);
}

#[test]
fn deleting_transect_tombstones_it_and_touches_project_in_one_commit() {
    let db = tracked_db();
    let survey = seed_survey(&db);
    let before = db.latest_ordinal();

    let mut txn = db.begin_write(None).unwrap();
    txn.delete(&table("transect"), survey.transect).unwrap();
    let committed = txn.commit().unwrap();

    assert_eq!(committed.entries.len(), 2);
    let tombstone = committed
        .entry_for(&RecordKey::new(table("transect"), survey.transect))
        .unwrap();
    assert!(tombstone.deleted);
    assert_eq!(tombstone.ordinal, before.next().unwrap());

    let project = committed.entry_for(&RecordKey::project(survey.project)).unwrap();
    assert!(!project.deleted);
    assert_eq!(project.ordinal, Ordinal::new(before.as_u64() + 2));

    let snapshot = db.snapshot();
    assert!(snapshot.get(&table("transect"), survey.transect).is_none());
    assert!(snapshot
        .revision(&RecordKey::new(table("transect"), survey.transect))
        .unwrap()
        .deleted);
}

#[test]
fn delete_resolves_project_after_ancestor_is_gone() {
    let db = tracked_db();
    let survey = seed_survey(&db);

    db.write(None, |txn| {
        txn.delete(&table("sample_event"), survey.event)?;
        txn.delete(&table("transect"), survey.transect)?;
        Ok(())
    })
    .unwrap();

    let snapshot = db.snapshot();
    let tombstone = snapshot
        .revision(&RecordKey::new(table("transect"), survey.transect))
        .unwrap();
    assert!(tombstone.deleted);
    assert_eq!(tombstone.project_id, Some(survey.project));
}

#[test]
fn unresolvable_project_aborts_whole_transaction() {
    let db = tracked_db();
    let survey = seed_survey(&db);
    let before = db.latest_ordinal();
    let orphan = RecordId::new();

    let mut txn = db.begin_write(None).unwrap();
    txn.update(
        &table("site"),
        survey.site,
        fields(json!({ "project": survey.project.to_string(), "name": "renamed" })),
    )
    .unwrap();
    let err = txn
        .insert(
            &table("transect"),
            orphan,
            fields(json!({ "sample_event": RecordId::new().to_string() })),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::ProjectResolution { .. }));
    assert!(txn.commit().is_err());

    let snapshot = db.snapshot();
    assert_eq!(snapshot.latest_ordinal(), before);
    assert_eq!(snapshot.get(&table("site"), survey.site).unwrap()["name"], "North");
    assert!(snapshot.get(&table("transect"), orphan).is_none());
}

#[test]
fn rolled_back_transaction_does_not_consume_ordinals() {
    let db = tracked_db();
    let before = db.latest_ordinal();
    {
        let mut txn = db.begin_write(None).unwrap();
        txn.insert(&table("choice"), RecordId::new(), Fields::new()).unwrap();
    }
    db.write(None, |txn| txn.insert(&table("choice"), RecordId::new(), Fields::new()))
        .unwrap();
    assert_eq!(db.latest_ordinal(), before.next().unwrap());
}

#[test]
fn global_tables_are_unscoped_and_do_not_cascade() {
    let db = tracked_db();
    let id = RecordId::new();
    let mut txn = db.begin_write(None).unwrap();
    txn.insert(&table("choice"), id, fields(json!({ "label": "sand" })))
        .unwrap();
    let committed = txn.commit().unwrap();

    assert_eq!(committed.entries.len(), 1);
    assert_eq!(committed.entries[0].project_id, None);
}

#[test]
fn touch_deleted_advances_tombstone() {
    let db = tracked_db();
    let survey = seed_survey(&db);
    db.write(None, |txn| txn.delete(&table("site"), survey.site).map(|_| ()))
        .unwrap();
    let key = RecordKey::new(table("site"), survey.site);
    let first = db.snapshot().revision(&key).cloned().unwrap();

    db.write(None, |txn| txn.touch_deleted(&table("site"), survey.site))
        .unwrap();

    let second = db.snapshot().revision(&key).cloned().unwrap();
    assert!(second.deleted);
    assert!(second.ordinal > first.ordinal);
    assert_eq!(second.project_id, Some(survey.project));
}

#[test]
fn owner_scoped_entries_carry_the_owner() {
    let db = tracked_db();
    let survey = seed_survey(&db);
    let owner = ProfileId::new();
    let admin = ProfileId::new();
    let record = RecordId::new();

    db.write(Some(admin), |txn| {
        txn.insert(
            &table("collect_record"),
            record,
            fields(json!({
                "project": survey.project.to_string(),
                "profile": owner.to_string(),
            })),
        )
    })
    .unwrap();

    let entry = db
        .snapshot()
        .revision(&RecordKey::new(table("collect_record"), record))
        .cloned()
        .unwrap();
    assert_eq!(entry.profile_id, Some(owner));

    let project = db.snapshot().revision(&RecordKey::project(survey.project)).cloned().unwrap();
    assert_eq!(project.profile_id, Some(admin));
}

#[test]
fn anchors_follow_latest_write_per_table() {
    let db = tracked_db();
    let survey = seed_survey(&db);
    let snapshot = db.snapshot();

    let anchor = snapshot.ledger().anchor(&table("transect")).unwrap();
    assert_eq!(anchor.record_id, survey.transect);
    let project_anchor = snapshot.ledger().anchor(&table("project")).unwrap();
    assert_eq!(project_anchor.ordinal, snapshot.latest_ordinal());
}

#[test]
fn subscribers_see_committed_writes_only() {
    let db = tracked_db();
    let rx = db.subscribe();
    {
        let mut txn = db.begin_write(None).unwrap();
        txn.insert(&table("choice"), RecordId::new(), Fields::new()).unwrap();
        txn.abort();
    }
    let survey = seed_survey(&db);

    // One notice per entry: the project touched three times in one commit
    // is announced once, at its final ordinal.
    let notices: Vec<_> = rx.try_iter().collect();
    assert_eq!(notices.len(), 4);
    assert_eq!(notices.last().unwrap().ordinal, Ordinal::new(7));
    assert!(notices.windows(2).all(|w| w[0].ordinal < w[1].ordinal));
    assert!(notices
        .iter()
        .any(|n| n.record_id == survey.transect && n.project_id == Some(survey.project)));
}

#[derive(Debug, Clone)]
enum Op {
    Create(usize),
    Update(usize),
    Delete(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize).prop_map(Op::Create),
        (0..8usize).prop_map(Op::Update),
        (0..8usize).prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn ordinals_are_strictly_increasing_and_unique(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let db = tracked_db();
        let survey = seed_survey(&db);
        let ids: Vec<RecordId> = (0..8).map(|_| RecordId::new()).collect();
        let site = table("site");
        let mut seen = HashSet::new();
        let mut last = db.latest_ordinal();

        for op in ops {
            let row = fields(json!({ "project": survey.project.to_string() }));
            let result = db.begin_write(None).and_then(|mut txn| {
                match op {
                    Op::Create(i) => txn.insert(&site, ids[i], row)?,
                    Op::Update(i) => txn.update(&site, ids[i], row)?,
                    Op::Delete(i) => { txn.delete(&site, ids[i])?; }
                }
                txn.commit()
            });

            if let Ok(committed) = result {
                for entry in &committed.entries {
                    prop_assert!(entry.ordinal > last);
                    prop_assert!(seen.insert(entry.ordinal));
                    last = entry.ordinal;
                }
            }
        }

        prop_assert_eq!(db.latest_ordinal(), last);
        let snapshot = db.snapshot();
        let all = snapshot.ledger().changes_since(
            &ChangeQuery::new(snapshot.registry().tables().cloned(), Ordinal::ZERO)
                .in_project(Some(survey.project)),
        );
        prop_assert!(all.windows(2).all(|w| w[0].ordinal < w[1].ordinal));
    }
}
