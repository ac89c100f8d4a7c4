//! End-to-end pull/push scenarios against a server.

use revsync_core::{Ordinal, ProfileId, ProjectId, RecordId, RecordKey, TableName};
use revsync_protocol::{Disposition, PullParams, PullResponse, PushRecord};
use revsync_server::SyncServer;
use revsync_testkit::prelude::*;
use serde_json::json;

fn pull(server: &SyncServer, project: ProjectId, since: Ordinal) -> PullResponse {
    server
        .handle_pull(
            project,
            Some(ProfileId::new()),
            PullParams {
                revision_num: Some(since.as_u64()),
                ..PullParams::default()
            },
        )
        .unwrap()
}

fn push_one(server: &SyncServer, project: ProjectId, record: PushRecord) -> Disposition {
    let response = server
        .handle_push(project, Some(ProfileId::new()), vec![record].into())
        .unwrap();
    assert_eq!(response.results.len(), 1);
    response.results[0].disposition.clone()
}

fn site_revision(server: &SyncServer, site: RecordId) -> Ordinal {
    server
        .database()
        .snapshot()
        .revision(&RecordKey::new(table("site"), site))
        .unwrap()
        .ordinal
}

#[test]
fn stale_push_conflicts_and_keeps_newer_data() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();

    // Client A syncs and sees the site.
    let a_view = pull(&server, survey.project, Ordinal::ZERO);
    let seen = a_view
        .updates
        .iter()
        .find(|u| u.id() == Some(survey.site))
        .unwrap()
        .revision_num;

    // Client B edits the site from the same revision.
    let b = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), survey.site, site_fields(survey.project, "B"))
            .seen_at(seen),
    );
    let Disposition::Applied { revision_num: b_rev } = b else {
        panic!("expected applied, got {b:?}");
    };
    assert!(b_rev > seen);

    // Client A pushes its edit based on the stale revision.
    let a = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), survey.site, site_fields(survey.project, "A"))
            .seen_at(seen),
    );
    assert_eq!(
        a,
        Disposition::Conflict {
            server_revision_num: b_rev
        }
    );

    let snapshot = server.database().snapshot();
    assert_eq!(snapshot.get(&table("site"), survey.site).unwrap()["name"], "B");
    assert_eq!(site_revision(&server, survey.site), b_rev);
}

#[test]
fn equal_ordinal_applies_and_advances() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let current = site_revision(&server, survey.site);

    let disposition = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), survey.site, site_fields(survey.project, "renamed"))
            .seen_at(current),
    );
    assert!(disposition.is_applied());
    assert!(site_revision(&server, survey.site) > current);
}

#[test]
fn push_without_ordinal_on_existing_record_conflicts() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let before = server.latest_ordinal();

    let disposition = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), survey.site, site_fields(survey.project, "x")),
    );
    assert!(disposition.is_conflict());
    assert_eq!(server.latest_ordinal(), before);
}

#[test]
fn brand_new_record_is_created() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let id = RecordId::new();

    let disposition = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), id, site_fields(survey.project, "South")),
    );
    let Disposition::Applied { revision_num } = disposition else {
        panic!("expected applied, got {disposition:?}");
    };
    assert_eq!(site_revision(&server, id), revision_num);
}

#[test]
fn rejected_record_does_not_roll_back_siblings() {
    let server = test_server_with_gate(RejectFieldValue::new("name", "bad"));
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let ids = [RecordId::new(), RecordId::new(), RecordId::new()];
    let batch: Vec<PushRecord> = ids
        .iter()
        .zip(["one", "bad", "three"])
        .map(|(id, name)| {
            PushRecord::upsert(table("site"), *id, site_fields(survey.project, name))
        })
        .collect();

    let response = server
        .handle_push(survey.project, Some(ProfileId::new()), batch.into())
        .unwrap();
    let statuses: Vec<&str> = response
        .results
        .iter()
        .map(|r| r.disposition.status())
        .collect();
    assert_eq!(statuses, ["applied", "rejected", "applied"]);
    let returned: Vec<RecordId> = response.results.iter().map(|r| r.id).collect();
    assert_eq!(returned, ids);

    let snapshot = server.database().snapshot();
    assert!(snapshot.get(&table("site"), ids[0]).is_some());
    assert!(snapshot.get(&table("site"), ids[1]).is_none());
    assert!(snapshot.get(&table("site"), ids[2]).is_some());
}

#[test]
fn pull_at_new_cursor_is_empty() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();

    let first = pull(&server, survey.project, Ordinal::ZERO);
    assert_eq!(first.updates.len(), 4);
    assert_eq!(first.revision_num, server.latest_ordinal());

    let second = pull(&server, survey.project, first.revision_num);
    assert!(second.is_empty());
    assert_eq!(second.revision_num, first.revision_num);

    // Re-pulling is side-effect free.
    assert_eq!(pull(&server, survey.project, Ordinal::ZERO), first);
}

#[test]
fn full_sync_omits_tombstones_incremental_reports_them() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let cursor = pull(&server, survey.project, Ordinal::ZERO).revision_num;

    let seen = server
        .database()
        .snapshot()
        .revision(&RecordKey::new(table("transect"), survey.transect))
        .unwrap()
        .ordinal;
    let disposition = push_one(
        &server,
        survey.project,
        PushRecord::delete(table("transect"), survey.transect).seen_at(seen),
    );
    assert!(disposition.is_applied());

    let full = pull(&server, survey.project, Ordinal::ZERO);
    assert!(full.deletes.is_empty());
    assert_eq!(full.updates.len(), 3);
    assert!(full.updates.iter().all(|u| u.id() != Some(survey.transect)));
    assert_eq!(full.revision_num, server.latest_ordinal());

    // The delete and the project touch, nothing else.
    let incremental = pull(&server, survey.project, cursor);
    assert_eq!(incremental.deletes.len(), 1);
    assert_eq!(incremental.deletes[0].id, survey.transect);
    assert_eq!(incremental.updates.len(), 1);
    assert_eq!(incremental.updates[0].table, TableName::project());
    assert!(incremental.updates[0].revision_num > incremental.deletes[0].revision_num);
}

#[test]
fn delete_of_deleted_record_applies_and_advances() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let seen = site_revision(&server, survey.site);

    let first = push_one(
        &server,
        survey.project,
        PushRecord::delete(table("site"), survey.site).seen_at(seen),
    );
    let Disposition::Applied { revision_num: tombstone } = first else {
        panic!("expected applied, got {first:?}");
    };

    // A second device deletes it too, from the old revision.
    let second = push_one(
        &server,
        survey.project,
        PushRecord::delete(table("site"), survey.site).seen_at(seen),
    );
    let Disposition::Applied { revision_num } = second else {
        panic!("expected applied, got {second:?}");
    };
    assert!(revision_num > tombstone);
}

#[test]
fn edit_of_deleted_record_conflicts() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let seen = site_revision(&server, survey.site);
    push_one(
        &server,
        survey.project,
        PushRecord::delete(table("site"), survey.site).seen_at(seen),
    );
    let tombstone = site_revision(&server, survey.site);

    let disposition = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), survey.site, site_fields(survey.project, "back"))
            .seen_at(tombstone),
    );
    assert_eq!(
        disposition,
        Disposition::Conflict {
            server_revision_num: tombstone
        }
    );
    assert!(server
        .database()
        .snapshot()
        .get(&table("site"), survey.site)
        .is_none());
}

#[test]
fn records_of_other_projects_are_rejected() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let other = ProjectId::new();
    let seen = site_revision(&server, survey.site);

    let disposition = push_one(
        &server,
        other,
        PushRecord::upsert(table("site"), survey.site, site_fields(other, "moved")).seen_at(seen),
    );
    assert!(disposition.is_rejected());
    assert_eq!(site_revision(&server, survey.site), seen);
}

#[test]
fn owner_scoped_records_are_private() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let owner = ProfileId::new();
    let stranger = ProfileId::new();
    let record = RecordId::new();

    let collect = fields(json!({
        "project": survey.project.to_string(),
        "profile": owner.to_string(),
        "data": {},
    }));
    let response = server
        .handle_push(
            survey.project,
            Some(owner),
            vec![PushRecord::upsert(table("collect_record"), record, collect)].into(),
        )
        .unwrap();
    assert!(response.is_fully_applied());

    let scope = || PullParams {
        revision_num: None,
        tables: Some("collect_record".into()),
        ..PullParams::default()
    };
    let mine = server
        .handle_pull(survey.project, Some(owner), scope())
        .unwrap();
    assert_eq!(mine.updates.len(), 1);

    let theirs = server
        .handle_pull(survey.project, Some(stranger), scope())
        .unwrap();
    assert!(theirs.is_empty());
}

#[test]
fn global_records_are_visible_to_every_project() {
    let server = test_server();
    let choice = RecordId::new();
    server
        .database()
        .write(None, |txn| {
            txn.insert(&table("choice"), choice, fields(json!({ "label": "sand" })))
        })
        .unwrap();

    for project in [ProjectId::new(), ProjectId::new()] {
        let response = pull(&server, project, Ordinal::ZERO);
        assert_eq!(response.updates.len(), 1);
        assert_eq!(response.updates[0].id(), Some(choice));
    }
}

#[test]
fn unknown_record_delete_is_acknowledged() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let before = server.latest_ordinal();
    let disposition = push_one(
        &server,
        survey.project,
        PushRecord::delete(table("site"), RecordId::new()),
    );
    assert!(disposition.is_applied());
    assert_eq!(server.latest_ordinal(), before);
}

#[test]
fn create_resolving_through_relations() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let observation = RecordId::new();

    let disposition = push_one(
        &server,
        survey.project,
        PushRecord::upsert(
            table("observation"),
            observation,
            fields(json!({ "transect": survey.transect.to_string(), "count": 3 })),
        ),
    );
    assert!(disposition.is_applied());

    let entry = server
        .database()
        .snapshot()
        .revision(&RecordKey::new(table("observation"), observation))
        .cloned()
        .unwrap();
    assert_eq!(entry.project_id, Some(survey.project));

    // An observation under a transect that does not exist cannot be placed.
    let orphan = push_one(
        &server,
        survey.project,
        PushRecord::upsert(
            table("observation"),
            RecordId::new(),
            fields(json!({ "transect": RecordId::new().to_string() })),
        ),
    );
    assert!(orphan.is_rejected());
}

#[test]
fn stale_invalid_push_reports_conflict() {
    let server = test_server_with_gate(RejectFieldValue::new("name", "bad"));
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let seen = site_revision(&server, survey.site);

    let edit = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), survey.site, site_fields(survey.project, "B"))
            .seen_at(seen),
    );
    let Disposition::Applied { revision_num } = edit else {
        panic!("expected applied, got {edit:?}");
    };

    // The client must re-pull before its invalid edit is even considered.
    let disposition = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), survey.site, site_fields(survey.project, "bad"))
            .seen_at(seen),
    );
    assert_eq!(
        disposition,
        Disposition::Conflict {
            server_revision_num: revision_num
        }
    );
}

#[test]
fn direct_write_makes_older_push_conflict() {
    let server = test_server();
    let survey = SurveyFixture::seed(server.database()).unwrap();
    let seen = site_revision(&server, survey.site);

    // An API writer updates the site without going through push.
    server
        .database()
        .write(Some(ProfileId::new()), |txn| {
            txn.update(&table("site"), survey.site, site_fields(survey.project, "B"))
        })
        .unwrap();
    let b_rev = site_revision(&server, survey.site);
    assert!(b_rev > seen);

    let a = push_one(
        &server,
        survey.project,
        PushRecord::upsert(table("site"), survey.site, site_fields(survey.project, "A"))
            .seen_at(seen),
    );
    assert_eq!(
        a,
        Disposition::Conflict {
            server_revision_num: b_rev
        }
    );
    let snapshot = server.database().snapshot();
    assert_eq!(snapshot.get(&table("site"), survey.site).unwrap()["name"], "B");
}
