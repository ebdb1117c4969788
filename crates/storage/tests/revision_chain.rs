#![forbid(unsafe_code)]

use rusqlite::{Connection, params};
use rv_core::model::{FileRevisionId, Project, UserId};
use rv_storage::delta::{EditOp, EditScript, ScriptFormat, ScriptHeader};
use rv_storage::{
    AddFileRequest, AddRevisionRequest, AddedFile, ChildBranchKind, CreateBranchRequest,
    RequestContext, RevisionDigest, ServiceContext, SqliteStore, StoreConfig, StoreError,
};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    store: SqliteStore,
    ctx: RequestContext,
    project: Project,
}

fn fixture_with(configure: impl FnOnce(&mut StoreConfig)) -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = StoreConfig::with_storage_dir(dir.path());
    configure(&mut config);
    let services = ServiceContext::new(config).expect("service context");
    let mut store = services.open_store().expect("open store");
    let mut ctx = services.request_context(UserId::new(7));
    let project = store
        .create_project(&mut ctx, "chain")
        .expect("create project");
    Fixture {
        dir,
        store,
        ctx,
        project,
    }
}

fn fixture() -> Fixture {
    fixture_with(|_| {})
}

fn raw_conn(fx: &Fixture) -> Connection {
    Connection::open(fx.dir.path().join("revisions.db")).expect("open raw connection")
}

fn add_file(fx: &mut Fixture, name: &str, content: &[u8]) -> AddedFile {
    let request = AddFileRequest {
        branch_id: fx.project.trunk_branch_id,
        directory_id: fx.project.root_directory_id,
        name: name.to_string(),
        content: content.to_vec(),
        commit_id: None,
        workfile_edit_ms: 1_000,
        message: format!("add {name}"),
    };
    fx.store.add_file(&mut fx.ctx, &request).expect("add file")
}

fn add_revision(fx: &mut Fixture, added: &AddedFile, content: &[u8]) -> FileRevisionId {
    let branch_id = fx.project.trunk_branch_id;
    add_revision_on(fx, branch_id, added, content).expect("add revision")
}

fn add_revision_on(
    fx: &mut Fixture,
    branch_id: rv_core::model::BranchId,
    added: &AddedFile,
    content: &[u8],
) -> Result<FileRevisionId, StoreError> {
    let request = AddRevisionRequest {
        branch_id,
        file_id: added.file_id,
        content: content.to_vec(),
        commit_id: None,
        workfile_edit_ms: 2_000,
        message: "edit".to_string(),
    };
    fx.store.add_revision(&mut fx.ctx, &request)
}

#[test]
fn every_revision_in_a_chain_hydrates_to_its_own_content() {
    let mut fx = fixture();
    let contents: Vec<Vec<u8>> = vec![
        b"line one\nline two\n".to_vec(),
        b"line one\nline 2\nline three\n".to_vec(),
        b"".to_vec(),
        b"fresh start\nno trailing newline".to_vec(),
        b"fresh start\nno trailing newline\n".to_vec(),
    ];

    let added = add_file(&mut fx, "notes.txt", &contents[0]);
    let mut ids = vec![added.revision_id];
    for content in &contents[1..] {
        ids.push(add_revision(&mut fx, &added, content));
    }

    for (id, expected) in ids.iter().zip(&contents) {
        let content = fx
            .store
            .get_file_revision(*id)
            .expect("hydrate")
            .expect("revision exists");
        assert_eq!(&content, expected, "revision {id}");
    }

    for pair in ids.windows(2) {
        let older = fx
            .store
            .file_revision_info(pair[0])
            .expect("info")
            .expect("revision exists");
        assert_eq!(older.reverse_delta_revision_id, Some(pair[1]));
        let newer = fx
            .store
            .file_revision_info(pair[1])
            .expect("info")
            .expect("revision exists");
        assert_eq!(newer.ancestor_revision_id, Some(pair[0]));
    }
    let newest = fx
        .store
        .newest_revision_all_branches(added.file_id)
        .expect("newest")
        .expect("has revisions");
    assert_eq!(Some(&newest.id), ids.last());
    assert!(newest.stores_full_content());
}

#[test]
fn unknown_revision_reads_as_none() {
    let fx = fixture();
    assert!(
        fx.store
            .get_file_revision(FileRevisionId::new(404))
            .expect("read")
            .is_none()
    );
    assert!(
        fx.store
            .checkout_revision(FileRevisionId::new(404))
            .expect("checkout")
            .is_none()
    );
}

#[test]
fn second_successor_for_an_ancestor_is_fatal_and_changes_nothing() {
    let mut fx = fixture();
    let x = add_file(&mut fx, "x.txt", b"x one\n");
    let r2 = add_revision(&mut fx, &x, b"x two\n");
    let y = add_file(&mut fx, "y.txt", b"y one\n");
    let r3 = y.revision_id;

    let raw = raw_conn(&fx);
    raw.execute(
        "UPDATE file_revisions SET reverse_delta_revision_id=?1 WHERE id=?2",
        params![r3.get(), r2.get()],
    )
    .expect("corrupt successor pointer");

    let trunk = fx.project.trunk_branch_id;
    let err = add_revision_on(&mut fx, trunk, &x, b"x three\n")
        .expect_err("a second successor must be rejected");
    assert!(
        matches!(
            err,
            StoreError::ReverseDeltaAlreadySet { revision_id, successor_id }
                if revision_id == r2 && successor_id == r3
        ),
        "unexpected error: {err:?}"
    );
    assert!(err.is_fatal());
    assert_eq!(err.code(), "REVERSE_DELTA_ALREADY_SET");

    let pointer: i64 = raw
        .query_row(
            "SELECT reverse_delta_revision_id FROM file_revisions WHERE id=?1",
            params![r2.get()],
            |row| row.get(0),
        )
        .expect("read pointer");
    assert_eq!(pointer, r3.get());
    let revisions: i64 = raw
        .query_row("SELECT COUNT(*) FROM file_revisions", [], |row| row.get(0))
        .expect("count");
    assert_eq!(revisions, 3, "the failed revision must be rolled back");
}

#[test]
fn delta_failure_keeps_full_content_on_the_ancestor() {
    let mut fx = fixture_with(|config| config.max_diff_input_bytes = 8);
    let added = add_file(&mut fx, "big.txt", b"more than eight bytes\n");
    let r2 = add_revision(&mut fx, &added, b"also more than eight\n");

    let ancestor = fx
        .store
        .file_revision_info(added.revision_id)
        .expect("info")
        .expect("exists");
    assert!(ancestor.stores_full_content());
    let successor = fx.store.file_revision_info(r2).expect("info").expect("exists");
    assert_eq!(successor.ancestor_revision_id, Some(added.revision_id));

    assert_eq!(
        fx.store.get_file_revision(added.revision_id).expect("read"),
        Some(b"more than eight bytes\n".to_vec())
    );
    assert_eq!(
        fx.store.get_file_revision(r2).expect("read"),
        Some(b"also more than eight\n".to_vec())
    );
}

#[test]
fn corrupt_script_is_a_fatal_hydration_error() {
    let mut fx = fixture();
    let added = add_file(&mut fx, "a.txt", b"alpha\n");
    add_revision(&mut fx, &added, b"beta\n");

    let mut garbage = vec![0u8; 8];
    garbage.extend_from_slice(&[0xff, 0xff, 0, 0, 0, 1]);
    raw_conn(&fx)
        .execute(
            "UPDATE file_revisions SET revision_data=?1 WHERE id=?2",
            params![garbage, added.revision_id.get()],
        )
        .expect("corrupt script");

    let err = fx
        .store
        .get_file_revision(added.revision_id)
        .expect_err("garbage cannot hydrate");
    assert!(matches!(err, StoreError::Hydration { revision_id, .. } if revision_id == added.revision_id));
    assert!(err.is_fatal());
    assert_eq!(err.code(), "UNABLE_TO_HYDRATE");
}

#[test]
fn stored_legacy_script_hydrates_through_the_fallback() {
    let mut fx = fixture();
    let added = add_file(&mut fx, "legacy.txt", b"placeholder\n");
    add_revision(&mut fx, &added, b"abcdefghij");

    let legacy = EditScript {
        header: ScriptHeader {
            base_len: 10,
            created_at: 0,
        },
        ops: vec![EditOp::Replace {
            seek: 2,
            deleted: 5,
            bytes: b"XYZ".to_vec(),
        }],
    }
    .encode(ScriptFormat::Legacy)
    .expect("encode legacy");
    raw_conn(&fx)
        .execute(
            "UPDATE file_revisions SET revision_data=?1 WHERE id=?2",
            params![legacy, added.revision_id.get()],
        )
        .expect("store legacy script");

    assert_eq!(
        fx.store.get_file_revision(added.revision_id).expect("hydrate"),
        Some(b"abXYZhij".to_vec())
    );
}

#[test]
fn chain_walks_past_the_configured_depth_are_refused() {
    let mut fx = fixture_with(|config| config.max_delta_chain_depth = 2);
    let added = add_file(&mut fx, "deep.txt", b"v1\n");
    let mut ids = vec![added.revision_id];
    for content in [b"v2\n", b"v3\n", b"v4\n"] {
        ids.push(add_revision(&mut fx, &added, content));
    }

    let err = fx
        .store
        .get_file_revision(ids[0])
        .expect_err("three links exceed the limit");
    assert!(matches!(err, StoreError::DeltaChainTooDeep { limit: 2, .. }));
    assert!(!err.is_fatal());

    assert_eq!(
        fx.store.get_file_revision(ids[1]).expect("two links"),
        Some(b"v2\n".to_vec())
    );
}

#[test]
fn sibling_branches_share_one_global_chain() {
    let mut fx = fixture();
    let added = add_file(&mut fx, "shared.txt", b"base\n");
    let feature = fx
        .store
        .create_branch(
            &mut fx.ctx,
            &CreateBranchRequest {
                parent_branch_id: fx.project.trunk_branch_id,
                name: "feature".to_string(),
                kind: ChildBranchKind::Feature,
            },
        )
        .expect("create feature");

    let on_feature = add_revision_on(&mut fx, feature.id, &added, b"feature edit\n")
        .expect("feature revision");
    let on_trunk = add_revision(&mut fx, &added, b"trunk edit\n");

    let trunk_info = fx
        .store
        .file_revision_info(on_trunk)
        .expect("info")
        .expect("exists");
    assert_eq!(trunk_info.ancestor_revision_id, Some(on_feature));
    let feature_info = fx
        .store
        .file_revision_info(on_feature)
        .expect("info")
        .expect("exists");
    assert_eq!(feature_info.ancestor_revision_id, Some(added.revision_id));
    assert_eq!(feature_info.reverse_delta_revision_id, Some(on_trunk));

    for (id, expected) in [
        (added.revision_id, &b"base\n"[..]),
        (on_feature, &b"feature edit\n"[..]),
        (on_trunk, &b"trunk edit\n"[..]),
    ] {
        assert_eq!(
            fx.store.get_file_revision(id).expect("hydrate").as_deref(),
            Some(expected)
        );
    }

    let trunk_history: Vec<_> = fx
        .store
        .file_revision_list(fx.project.trunk_branch_id, added.file_id)
        .expect("trunk history")
        .into_iter()
        .map(|revision| revision.id)
        .collect();
    assert_eq!(trunk_history, vec![on_trunk, added.revision_id]);

    let feature_history: Vec<_> = fx
        .store
        .file_revision_list(feature.id, added.file_id)
        .expect("feature history")
        .into_iter()
        .map(|revision| revision.id)
        .collect();
    assert_eq!(feature_history, vec![on_trunk, on_feature, added.revision_id]);
}

#[test]
fn revision_metadata_carries_digest_and_edit_time() {
    let mut fx = fixture();
    let added = add_file(&mut fx, "meta.txt", b"digest me\n");
    let info = fx
        .store
        .file_revision_info(added.revision_id)
        .expect("info")
        .expect("exists");
    assert_eq!(info.digest, RevisionDigest::new().compute(b"digest me\n"));
    assert_eq!(info.digest.len(), 32);
    assert_eq!(info.workfile_edit_ms, 1_000);
    assert_eq!(info.branch_id, fx.project.trunk_branch_id);
    assert!(!info.promoted);
}

#[test]
fn checkout_writes_a_scratch_file_in_the_storage_dir() {
    let mut fx = fixture();
    let added = add_file(&mut fx, "out.txt", b"first\n");
    add_revision(&mut fx, &added, b"second\n");

    let checkout = fx
        .store
        .checkout_revision(added.revision_id)
        .expect("checkout")
        .expect("revision exists");
    assert!(checkout.path().starts_with(fx.dir.path()));
    assert_eq!(std::fs::read(checkout.path()).expect("read checkout"), b"first\n");

    let path = checkout.path().to_path_buf();
    drop(checkout);
    assert!(!path.exists());
}

#[test]
fn explicit_commit_ids_must_exist() {
    let mut fx = fixture();
    let added = add_file(&mut fx, "c.txt", b"one\n");
    let request = AddRevisionRequest {
        branch_id: fx.project.trunk_branch_id,
        file_id: added.file_id,
        content: b"two\n".to_vec(),
        commit_id: Some(rv_core::model::CommitId::new(9_999)),
        workfile_edit_ms: 0,
        message: "edit".to_string(),
    };
    let err = fx
        .store
        .add_revision(&mut fx.ctx, &request)
        .expect_err("unknown commit");
    assert!(matches!(err, StoreError::UnknownId));

    let info = fx
        .store
        .file_revision_info(added.revision_id)
        .expect("info")
        .expect("exists");
    let request = AddRevisionRequest {
        commit_id: Some(info.commit_id),
        ..request
    };
    let r2 = fx.store.add_revision(&mut fx.ctx, &request).expect("reuse commit");
    let r2_info = fx.store.file_revision_info(r2).expect("info").expect("exists");
    assert_eq!(r2_info.commit_id, info.commit_id);
}
