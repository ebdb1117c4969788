#![forbid(unsafe_code)]

use rusqlite::{Connection, params};
use rv_core::model::{
    Branch, BranchId, CreatedForReason, DirectoryId, Project, UserId,
};
use rv_storage::{
    AddFileRequest, AddedFile, ChildBranchKind, CreateBranchRequest, RequestContext,
    ServiceContext, SqliteStore, StoreConfig, StoreError,
};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    store: SqliteStore,
    ctx: RequestContext,
    project: Project,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("temp dir");
    let services =
        ServiceContext::new(StoreConfig::with_storage_dir(dir.path())).expect("service context");
    let mut store = services.open_store().expect("open store");
    let mut ctx = services.request_context(UserId::new(11));
    let project = store.create_project(&mut ctx, "cow").expect("create project");
    Fixture {
        dir,
        store,
        ctx,
        project,
    }
}

fn feature(fx: &mut Fixture, name: &str, kind: ChildBranchKind) -> Branch {
    fx.store
        .create_branch(
            &mut fx.ctx,
            &CreateBranchRequest {
                parent_branch_id: fx.project.trunk_branch_id,
                name: name.to_string(),
                kind,
            },
        )
        .expect("create branch")
}

fn add_file(
    fx: &mut Fixture,
    branch_id: BranchId,
    directory_id: DirectoryId,
    name: &str,
    content: &[u8],
) -> AddedFile {
    fx.store
        .add_file(
            &mut fx.ctx,
            &AddFileRequest {
                branch_id,
                directory_id,
                name: name.to_string(),
                content: content.to_vec(),
                commit_id: None,
                workfile_edit_ms: 500,
                message: format!("add {name}"),
            },
        )
        .expect("add file")
}

fn file_name_rows(fx: &Fixture) -> i64 {
    Connection::open(fx.dir.path().join("revisions.db"))
        .expect("raw connection")
        .query_row("SELECT COUNT(*) FROM file_names", [], |row| row.get(0))
        .expect("count file names")
}

#[test]
fn deleting_on_a_descendant_leaves_the_origin_row_untouched() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let added = add_file(&mut fx, trunk, root_dir, "a.txt", b"alpha\n");
    let before = fx
        .store
        .file_name(added.file_name_id)
        .expect("read")
        .expect("exists");
    let branch = feature(&mut fx, "b", ChildBranchKind::Feature);

    let change = fx
        .store
        .delete_file(&mut fx.ctx, branch.id, added.file_name_id)
        .expect("delete on branch");
    assert_ne!(change.file_name_id, added.file_name_id);

    let scoped = fx
        .store
        .file_name(change.file_name_id)
        .expect("read")
        .expect("exists");
    assert_eq!(scoped.branch_id, branch.id);
    assert_eq!(scoped.file_id, added.file_id);
    assert!(scoped.deleted);
    assert_eq!(scoped.created_for, Some(CreatedForReason::Delete));

    let origin = fx
        .store
        .file_name(added.file_name_id)
        .expect("read")
        .expect("exists");
    assert_eq!(origin, before);

    assert!(
        fx.store
            .find_file_name(branch.id, root_dir, "a.txt")
            .expect("lookup")
            .is_none()
    );
    assert_eq!(
        fx.store
            .find_file_name(trunk, root_dir, "a.txt")
            .expect("lookup")
            .map(|row| row.id),
        Some(added.file_name_id)
    );

    // The structural change is recorded as a carried-forward revision on the branch.
    let carried = fx
        .store
        .file_revision_info(change.revision_id)
        .expect("info")
        .expect("exists");
    assert_eq!(carried.branch_id, branch.id);
    assert_eq!(
        fx.store.get_file_revision(change.revision_id).expect("hydrate"),
        Some(b"alpha\n".to_vec())
    );
}

#[test]
fn deleting_on_the_origin_branch_mutates_in_place() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let added = add_file(&mut fx, trunk, root_dir, "a.txt", b"alpha\n");

    let change = fx
        .store
        .delete_file(&mut fx.ctx, trunk, added.file_name_id)
        .expect("delete on trunk");
    assert_eq!(change.file_name_id, added.file_name_id);
    assert_eq!(file_name_rows(&fx), 1);

    let row = fx
        .store
        .file_name(added.file_name_id)
        .expect("read")
        .expect("exists");
    assert!(row.deleted);
    assert_eq!(row.created_for, None);

    let err = fx
        .store
        .delete_file(&mut fx.ctx, trunk, added.file_name_id)
        .expect_err("already deleted");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    // Adding the same name again brings the same identity back.
    let again = add_file(&mut fx, trunk, root_dir, "a.txt", b"alpha again\n");
    assert_eq!(again.file_name_id, added.file_name_id);
    assert_eq!(again.file_id, added.file_id);
    assert_eq!(file_name_rows(&fx), 1);
    assert_eq!(
        fx.store.get_file_revision(again.revision_id).expect("hydrate"),
        Some(b"alpha again\n".to_vec())
    );
}

#[test]
fn re_adding_a_file_an_ancestor_deleted_reuses_the_identity() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let added = add_file(&mut fx, trunk, root_dir, "gone.txt", b"v1\n");
    fx.store
        .delete_file(&mut fx.ctx, trunk, added.file_name_id)
        .expect("delete on trunk");
    let branch = feature(&mut fx, "revive", ChildBranchKind::Feature);

    let revived = add_file(&mut fx, branch.id, root_dir, "gone.txt", b"v2\n");
    assert_eq!(revived.file_id, added.file_id);
    assert_ne!(revived.file_name_id, added.file_name_id);
    assert!(
        fx.store
            .find_file_name(trunk, root_dir, "gone.txt")
            .expect("lookup")
            .is_none()
    );
    assert_eq!(
        fx.store
            .find_file_name(branch.id, root_dir, "gone.txt")
            .expect("lookup")
            .map(|row| row.id),
        Some(revived.file_name_id)
    );
}

#[test]
fn renames_and_moves_on_a_branch_are_branch_scoped() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let root = fx.project.root_location_id;
    let docs = fx
        .store
        .add_directory(&mut fx.ctx, trunk, root, "docs")
        .expect("add docs");
    let added = add_file(&mut fx, trunk, root_dir, "readme.md", b"# readme\n");
    let branch = feature(&mut fx, "docs-move", ChildBranchKind::Feature);

    let renamed = fx
        .store
        .rename_file(&mut fx.ctx, branch.id, added.file_name_id, "README.md")
        .expect("rename on branch");
    let row = fx
        .store
        .file_name(renamed.file_name_id)
        .expect("read")
        .expect("exists");
    assert_eq!(row.branch_id, branch.id);
    assert_eq!(row.name, "README.md");
    assert_eq!(row.created_for, Some(CreatedForReason::Rename));

    // The branch owns a row now, so the move updates it in place.
    let moved = fx
        .store
        .move_file(&mut fx.ctx, branch.id, added.file_name_id, docs.directory_id)
        .expect("move on branch");
    assert_eq!(moved.file_name_id, renamed.file_name_id);
    let row = fx
        .store
        .file_name(moved.file_name_id)
        .expect("read")
        .expect("exists");
    assert_eq!(row.directory_id, docs.directory_id);
    assert_eq!(row.created_for, Some(CreatedForReason::Rename));

    assert!(
        fx.store
            .find_file_name(branch.id, root_dir, "readme.md")
            .expect("lookup")
            .is_none()
    );
    assert!(
        fx.store
            .find_file_name(branch.id, docs.directory_id, "README.md")
            .expect("lookup")
            .is_some()
    );
    let trunk_row = fx
        .store
        .find_file_name(trunk, root_dir, "readme.md")
        .expect("lookup")
        .expect("trunk unchanged");
    assert_eq!(trunk_row.id, added.file_name_id);

    let history = fx
        .store
        .file_revision_list(branch.id, added.file_id)
        .expect("history");
    assert_eq!(history.len(), 3, "add on trunk plus two carried-forward revisions");
    for revision in &history {
        assert_eq!(
            fx.store.get_file_revision(revision.id).expect("hydrate"),
            Some(b"# readme\n".to_vec())
        );
    }
}

#[test]
fn move_and_rename_is_tagged_with_both_reasons() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let root = fx.project.root_location_id;
    let bin = fx
        .store
        .add_directory(&mut fx.ctx, trunk, root, "bin")
        .expect("add bin");
    let added = add_file(&mut fx, trunk, root_dir, "tool", b"#!/bin/sh\n");
    let branch = feature(&mut fx, "tools", ChildBranchKind::Feature);

    let change = fx
        .store
        .move_and_rename_file(
            &mut fx.ctx,
            branch.id,
            added.file_name_id,
            bin.directory_id,
            "tool.sh",
        )
        .expect("move and rename");
    let row = fx
        .store
        .file_name(change.file_name_id)
        .expect("read")
        .expect("exists");
    assert_eq!(row.created_for, Some(CreatedForReason::MoveAndRename));
    assert_eq!(row.directory_id, bin.directory_id);
    assert_eq!(row.name, "tool.sh");

    // On trunk, which owns the row, the same change is applied in place.
    let in_place = fx
        .store
        .move_and_rename_file(
            &mut fx.ctx,
            trunk,
            added.file_name_id,
            bin.directory_id,
            "tool.sh",
        )
        .expect("move and rename on trunk");
    assert_eq!(in_place.file_name_id, added.file_name_id);
}

#[test]
fn moving_into_a_missing_directory_is_fatal() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let root = fx.project.root_location_id;
    let added = add_file(&mut fx, trunk, root_dir, "a.txt", b"a\n");

    let err = fx
        .store
        .move_file(&mut fx.ctx, trunk, added.file_name_id, DirectoryId::new(9_999))
        .expect_err("no such directory");
    assert!(matches!(err, StoreError::Invariant(_)));
    assert!(err.is_fatal());

    let tmp = fx
        .store
        .add_directory(&mut fx.ctx, trunk, root, "tmp")
        .expect("add tmp");
    fx.store
        .delete_directory(&mut fx.ctx, trunk, tmp.id)
        .expect("delete tmp");
    let err = fx
        .store
        .move_file(&mut fx.ctx, trunk, added.file_name_id, tmp.directory_id)
        .expect_err("deleted directory");
    assert!(matches!(err, StoreError::Invariant(_)));

    let row = fx
        .store
        .file_name(added.file_name_id)
        .expect("read")
        .expect("exists");
    assert_eq!(row.directory_id, root_dir, "failed moves roll back");
}

#[test]
fn name_collisions_are_rejected() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let a = add_file(&mut fx, trunk, root_dir, "a.txt", b"a\n");
    add_file(&mut fx, trunk, root_dir, "b.txt", b"b\n");

    let err = fx
        .store
        .rename_file(&mut fx.ctx, trunk, a.file_name_id, "b.txt")
        .expect_err("name taken");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let err = fx
        .store
        .add_file(
            &mut fx.ctx,
            &AddFileRequest {
                branch_id: trunk,
                directory_id: root_dir,
                name: "a.txt".to_string(),
                content: Vec::new(),
                commit_id: None,
                workfile_edit_ms: 0,
                message: "dup".to_string(),
            },
        )
        .expect_err("file exists");
    assert!(matches!(err, StoreError::InvalidInput("file already exists")));

    let err = fx
        .store
        .rename_file(&mut fx.ctx, trunk, a.file_name_id, "bad/name")
        .expect_err("separator in name");
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[test]
fn directory_changes_follow_the_same_copy_on_write_rule() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root = fx.project.root_location_id;
    let outer = fx
        .store
        .add_directory(&mut fx.ctx, trunk, root, "outer")
        .expect("add outer");
    let inner = fx
        .store
        .add_directory(&mut fx.ctx, trunk, outer.id, "inner")
        .expect("add inner");
    let branch = feature(&mut fx, "dirs", ChildBranchKind::Feature);

    let moved = fx
        .store
        .move_directory(&mut fx.ctx, branch.id, inner.id, root)
        .expect("move inner to root on branch");
    assert_eq!(moved.branch_id, branch.id);
    assert_eq!(moved.created_for, Some(CreatedForReason::Move));
    assert_eq!(moved.directory_id, inner.directory_id);

    assert_eq!(
        fx.store
            .find_directory_location_by_appended_path(branch.id, "inner")
            .expect("resolve")
            .map(|location| location.id),
        Some(moved.id)
    );
    assert!(
        fx.store
            .find_directory_location_by_appended_path(branch.id, "outer/inner")
            .expect("resolve")
            .is_none()
    );
    assert_eq!(
        fx.store
            .find_directory_location_by_appended_path(trunk, "outer/inner")
            .expect("resolve")
            .map(|location| location.id),
        Some(inner.id)
    );

    let err = fx
        .store
        .move_directory(&mut fx.ctx, trunk, outer.id, inner.id)
        .expect_err("cannot move into a descendant");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let err = fx
        .store
        .move_directory(
            &mut fx.ctx,
            trunk,
            inner.id,
            rv_core::model::DirectoryLocationId::new(9_999),
        )
        .expect_err("missing destination");
    assert!(matches!(err, StoreError::Invariant(_)));

    let err = fx
        .store
        .delete_directory(&mut fx.ctx, trunk, root)
        .expect_err("root is permanent");
    assert!(matches!(err, StoreError::InvalidInput(_)));

    let deleted = fx
        .store
        .delete_directory(&mut fx.ctx, branch.id, outer.id)
        .expect("delete outer on branch");
    assert!(deleted.deleted);
    assert_eq!(deleted.created_for, Some(CreatedForReason::Delete));
    let trunk_outer = fx
        .store
        .directory_location(outer.id)
        .expect("read")
        .expect("exists");
    assert!(!trunk_outer.deleted);
}

#[test]
fn read_only_branches_reject_structural_changes() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let added = add_file(&mut fx, trunk, root_dir, "a.txt", b"a\n");
    let frozen = feature(&mut fx, "frozen", ChildBranchKind::ReadOnly);

    let err = fx
        .store
        .delete_file(&mut fx.ctx, frozen.id, added.file_name_id)
        .expect_err("read-only");
    assert!(matches!(err, StoreError::BranchReadOnly { .. }));
    assert_eq!(err.code(), "BRANCH_READ_ONLY");
    assert!(!err.is_fatal());

    let err = fx
        .store
        .add_directory(&mut fx.ctx, frozen.id, fx.project.root_location_id, "x")
        .expect_err("read-only");
    assert!(matches!(err, StoreError::BranchReadOnly { .. }));
}

#[test]
fn stored_reason_codes_are_stable() {
    let mut fx = fixture();
    let trunk = fx.project.trunk_branch_id;
    let root_dir = fx.project.root_directory_id;
    let added = add_file(&mut fx, trunk, root_dir, "a.txt", b"a\n");
    let branch = feature(&mut fx, "codes", ChildBranchKind::Feature);
    let change = fx
        .store
        .delete_file(&mut fx.ctx, branch.id, added.file_name_id)
        .expect("delete");

    let code: i64 = Connection::open(fx.dir.path().join("revisions.db"))
        .expect("raw connection")
        .query_row(
            "SELECT created_for_reason FROM file_names WHERE id=?1",
            params![change.file_name_id.get()],
            |row| row.get(0),
        )
        .expect("read code");
    assert_eq!(code, CreatedForReason::Delete.code());
}
