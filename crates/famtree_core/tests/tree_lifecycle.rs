use famtree_core::db::open_db_in_memory;
use famtree_core::service::guest_session_service::new_guest_token;
use famtree_core::{
    audit_tree, FamilyError, Gender, IdentityService, MemberProfile, MemberRole, MemberStore,
    Privacy, Requester, SeedMember, SqliteMemberStore, SqliteTreeStore, SqliteUserStore,
    TreeDetails, TreePatch, TreeService, TreeStore, User, UserStore, VerifiedIdentity,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(
    conn: &Connection,
) -> TreeService<SqliteMemberStore<'_>, SqliteTreeStore<'_>, SqliteUserStore<'_>> {
    TreeService::new(
        SqliteMemberStore::try_new(conn).unwrap(),
        SqliteTreeStore::try_new(conn).unwrap(),
        SqliteUserStore::try_new(conn).unwrap(),
    )
}

fn register(conn: &Connection, subject: &str) -> User {
    IdentityService::new(SqliteUserStore::try_new(conn).unwrap())
        .resolve_user(&VerifiedIdentity::new(subject))
        .unwrap()
}

fn seed() -> Vec<SeedMember> {
    vec![
        SeedMember::new(MemberProfile::new("Sam", Gender::Male), MemberRole::Reference),
        SeedMember::new(MemberProfile::new("Mo", Gender::Female), MemberRole::Mother),
        SeedMember::new(MemberProfile::new("Fa", Gender::Male), MemberRole::Father),
    ]
}

#[test]
fn seeded_tree_lists_mother_father_self_in_order() {
    let conn = setup();
    let user = register(&conn, "uid-owner");

    let view = service(&conn)
        .create_tree_with_initial_members(
            &Requester::User(user.id),
            TreeDetails::named("  Smiths  "),
            seed(),
        )
        .unwrap();

    assert_eq!(view.tree.name, "Smiths");
    let roles: Vec<MemberRole> = view.members.iter().map(|member| member.role).collect();
    assert_eq!(
        roles,
        vec![MemberRole::Mother, MemberRole::Father, MemberRole::Reference]
    );
    let ids: Vec<_> = view.members.iter().map(|member| member.id).collect();
    assert_eq!(view.tree.members, ids);
    assert_eq!(view.members[2].mother, Some(ids[0]));
    assert_eq!(view.members[2].father, Some(ids[1]));
    assert_eq!(view.members[0].children, vec![ids[2]]);
    assert!(audit_tree(&view.tree, &view.members).is_consistent());

    let users = SqliteUserStore::try_new(&conn).unwrap();
    assert_eq!(
        users.get_user(user.id).unwrap().unwrap().family_trees,
        vec![view.tree.id]
    );
}

#[test]
fn seed_without_all_three_roles_writes_nothing() {
    let conn = setup();
    let user = register(&conn, "uid-owner");
    let mut partial = seed();
    partial.retain(|member| member.role != MemberRole::Father);

    let err = service(&conn)
        .create_tree_with_initial_members(
            &Requester::User(user.id),
            TreeDetails::named("Partial"),
            partial,
        )
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));
    assert!(service(&conn)
        .list_trees(&Requester::User(user.id))
        .unwrap()
        .is_empty());
}

#[test]
fn blank_tree_name_is_rejected() {
    let conn = setup();
    let user = register(&conn, "uid-owner");
    let err = service(&conn)
        .create_tree(&Requester::User(user.id), TreeDetails::named("   "))
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));
}

#[test]
fn guest_may_hold_one_unclaimed_tree() {
    let conn = setup();
    let guest = Requester::Guest(new_guest_token());

    service(&conn)
        .create_tree(&guest, TreeDetails::named("First"))
        .unwrap();
    let err = service(&conn)
        .create_tree(&guest, TreeDetails::named("Second"))
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidState(_)));

    let err = service(&conn)
        .create_tree(&Requester::Guest("short".to_string()), TreeDetails::named("Bad"))
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));

    assert_eq!(service(&conn).list_trees(&guest).unwrap().len(), 1);
}

#[test]
fn list_trees_is_scoped_to_the_requester() {
    let conn = setup();
    let ada = register(&conn, "uid-ada");
    let bob = register(&conn, "uid-bob");
    let trees = service(&conn);

    let first = trees
        .create_tree(&Requester::User(ada.id), TreeDetails::named("One"))
        .unwrap();
    let second = trees
        .create_tree(&Requester::User(ada.id), TreeDetails::named("Two"))
        .unwrap();
    trees
        .create_tree(&Requester::User(bob.id), TreeDetails::named("Bob's"))
        .unwrap();

    let listed: Vec<_> = trees
        .list_trees(&Requester::User(ada.id))
        .unwrap()
        .into_iter()
        .map(|tree| tree.id)
        .collect();
    assert_eq!(listed, vec![first.id, second.id]);
}

#[test]
fn privacy_changes_mint_and_clear_shareable_link() {
    let conn = setup();
    let user = register(&conn, "uid-owner");
    let trees = service(&conn);
    let tree = trees
        .create_tree(&Requester::User(user.id), TreeDetails::named("Shared"))
        .unwrap();

    let err = trees.update_tree(&tree, TreePatch::default()).unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));

    let shared = trees
        .update_tree(
            &tree,
            TreePatch {
                privacy: Some(Privacy::PublicLink),
                description: Some(" Our family ".to_string()),
                ..TreePatch::default()
            },
        )
        .unwrap();
    let link = shared.shareable_link.clone().unwrap();
    assert_eq!(shared.description.as_deref(), Some("Our family"));
    let found = SqliteTreeStore::try_new(&conn)
        .unwrap()
        .find_by_shareable_link(&link)
        .unwrap()
        .unwrap();
    assert_eq!(found.id, tree.id);
    let shared_view = trees.shared_view(&link).unwrap();
    assert_eq!(shared_view.tree.id, tree.id);

    let private = trees
        .update_tree(
            &shared,
            TreePatch {
                privacy: Some(Privacy::Private),
                ..TreePatch::default()
            },
        )
        .unwrap();
    assert_eq!(private.shareable_link, None);
    let err = trees.shared_view(&link).unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
}

#[test]
fn delete_tree_removes_members_and_owner_listing() {
    let conn = setup();
    let user = register(&conn, "uid-owner");
    let trees = service(&conn);
    let view = trees
        .create_tree_with_initial_members(
            &Requester::User(user.id),
            TreeDetails::named("Doomed"),
            seed(),
        )
        .unwrap();

    let deleted = trees.delete_tree(&view.tree).unwrap();
    assert_eq!(deleted, 3);

    assert!(SqliteTreeStore::try_new(&conn)
        .unwrap()
        .get_tree(view.tree.id)
        .unwrap()
        .is_none());
    assert!(SqliteMemberStore::try_new(&conn)
        .unwrap()
        .list_members(view.tree.id)
        .unwrap()
        .is_empty());
    assert!(SqliteUserStore::try_new(&conn)
        .unwrap()
        .get_user(user.id)
        .unwrap()
        .unwrap()
        .family_trees
        .is_empty());
}
