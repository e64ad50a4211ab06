use famtree_core::db::open_db_in_memory;
use famtree_core::service::guest_session_service::new_guest_token;
use famtree_core::{
    audit_stored_tree, FamilyError, Gender, Member, MemberId, MemberPatch, MemberProfile,
    MemberRole, MemberStore, NewChild, NewMember, NewSpouse, ParentSlot, RelationshipService,
    Requester, SpouseLink, SqliteMemberStore, SqliteTreeStore, SqliteUserStore, Tree, TreeDetails,
    TreeService, TreeStore,
};
use rusqlite::Connection;

type Relationships<'conn> = RelationshipService<SqliteMemberStore<'conn>, SqliteTreeStore<'conn>>;

struct Family {
    tree: Tree,
    mother: MemberId,
    father: MemberId,
    reference: MemberId,
}

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn relationships(conn: &Connection) -> Relationships<'_> {
    RelationshipService::new(
        SqliteMemberStore::try_new(conn).unwrap(),
        SqliteTreeStore::try_new(conn).unwrap(),
    )
}

fn new_tree(conn: &Connection) -> Tree {
    let service = TreeService::new(
        SqliteMemberStore::try_new(conn).unwrap(),
        SqliteTreeStore::try_new(conn).unwrap(),
        SqliteUserStore::try_new(conn).unwrap(),
    );
    service
        .create_tree(
            &Requester::Guest(new_guest_token()),
            TreeDetails::named("Family"),
        )
        .unwrap()
}

fn reload_tree(conn: &Connection, tree: &Tree) -> Tree {
    SqliteTreeStore::try_new(conn)
        .unwrap()
        .get_tree(tree.id)
        .unwrap()
        .unwrap()
}

fn load(conn: &Connection, tree: &Tree, member_id: MemberId) -> Member {
    SqliteMemberStore::try_new(conn)
        .unwrap()
        .get_member(tree.id, member_id)
        .unwrap()
        .unwrap()
}

fn profile(name: &str, gender: Gender) -> MemberProfile {
    MemberProfile::new(name, gender)
}

fn assert_consistent(conn: &Connection, tree: &Tree) {
    let tree = reload_tree(conn, tree);
    let report = audit_stored_tree(&SqliteMemberStore::try_new(conn).unwrap(), &tree).unwrap();
    assert!(report.is_consistent(), "violations: {:?}", report.violations);
}

fn seed_family(conn: &Connection) -> Family {
    let tree = new_tree(conn);
    let service = relationships(conn);
    let mother = service
        .add_member(
            &tree,
            NewMember::new(profile("Mo", Gender::Female), MemberRole::Mother),
        )
        .unwrap();
    let father = service
        .add_member(
            &tree,
            NewMember::new(profile("Fa", Gender::Male), MemberRole::Father),
        )
        .unwrap();
    let reference = service
        .add_member(
            &tree,
            NewMember::new(profile("Sam", Gender::Other), MemberRole::Reference)
                .with_parents(mother.id, father.id),
        )
        .unwrap();
    Family {
        tree: reload_tree(conn, &tree),
        mother: mother.id,
        father: father.id,
        reference: reference.id,
    }
}

#[test]
fn reference_member_requires_both_parents_and_writes_nothing_otherwise() {
    let conn = setup();
    let tree = new_tree(&conn);
    let service = relationships(&conn);

    let err = service
        .add_member(
            &tree,
            NewMember::new(profile("Sam", Gender::Other), MemberRole::Reference),
        )
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)), "{err}");
    assert!(reload_tree(&conn, &tree).members.is_empty());
    assert!(service.list_members(&tree).unwrap().is_empty());
}

#[test]
fn seeding_parents_then_self_links_children_both_ways() {
    let conn = setup();
    let family = seed_family(&conn);

    assert_eq!(
        family.tree.members,
        vec![family.mother, family.father, family.reference]
    );
    let mother = load(&conn, &family.tree, family.mother);
    let father = load(&conn, &family.tree, family.father);
    let reference = load(&conn, &family.tree, family.reference);
    assert_eq!(mother.children, vec![family.reference]);
    assert_eq!(father.children, vec![family.reference]);
    assert_eq!(reference.mother, Some(family.mother));
    assert_eq!(reference.father, Some(family.father));
    assert_consistent(&conn, &family.tree);
}

#[test]
fn add_spouse_creates_reciprocal_links_without_duplicates() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let spouse = service
        .add_spouse(
            &family.tree,
            family.reference,
            NewSpouse {
                profile: profile("Pat", Gender::Female),
                relationship_type: None,
            },
        )
        .unwrap();
    assert_eq!(spouse.role, MemberRole::Spouse);

    let reference = load(&conn, &family.tree, family.reference);
    let spouse = load(&conn, &family.tree, spouse.id);
    assert_eq!(
        reference.spouses,
        vec![SpouseLink::new(spouse.id, Some("spouse".to_string()))]
    );
    assert_eq!(
        spouse.spouses,
        vec![SpouseLink::new(family.reference, Some("spouse".to_string()))]
    );

    service
        .link_spouse(&family.tree, family.reference, spouse.id, Some("married".to_string()))
        .unwrap();
    service
        .link_spouse(&family.tree, spouse.id, family.reference, None)
        .unwrap();
    assert_eq!(load(&conn, &family.tree, family.reference).spouses.len(), 1);
    assert_eq!(load(&conn, &family.tree, spouse.id).spouses.len(), 1);
    assert_eq!(reload_tree(&conn, &family.tree).members.len(), 4);
    assert_consistent(&conn, &family.tree);
}

#[test]
fn add_sibling_shares_parents_and_keeps_existing_children() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let sibling = service
        .add_sibling(&family.tree, family.reference, profile("Sib", Gender::Male))
        .unwrap();
    assert_eq!(sibling.mother, Some(family.mother));
    assert_eq!(sibling.father, Some(family.father));
    assert_eq!(sibling.role, MemberRole::Sibling);

    for parent in [family.mother, family.father] {
        let parent = load(&conn, &family.tree, parent);
        assert_eq!(parent.children, vec![family.reference, sibling.id]);
    }
    assert_consistent(&conn, &family.tree);
}

#[test]
fn add_sibling_without_both_parents_is_invalid_state() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let err = service
        .add_sibling(&family.tree, family.mother, profile("Aunt", Gender::Female))
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidState(_)), "{err}");
    assert_eq!(reload_tree(&conn, &family.tree).members.len(), 3);
}

#[test]
fn deleting_a_parent_clears_references_without_cascading() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let summary = service
        .delete_member(&family.tree, family.mother)
        .unwrap();
    assert_eq!(summary.parent_refs_cleared, 1);

    let tree = reload_tree(&conn, &family.tree);
    assert_eq!(tree.members, vec![family.father, family.reference]);
    let reference = load(&conn, &tree, family.reference);
    assert_eq!(reference.mother, None);
    assert_eq!(reference.father, Some(family.father));
    assert_eq!(
        load(&conn, &tree, family.father).children,
        vec![family.reference]
    );
    assert!(SqliteMemberStore::try_new(&conn)
        .unwrap()
        .get_member(tree.id, family.mother)
        .unwrap()
        .is_none());
    assert_consistent(&conn, &tree);
}

#[test]
fn deleting_a_member_scrubs_spouse_and_child_sets() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);
    service
        .link_spouse(&family.tree, family.mother, family.father, None)
        .unwrap();

    service
        .delete_member(&family.tree, family.reference)
        .unwrap();

    let tree = reload_tree(&conn, &family.tree);
    let mother = load(&conn, &tree, family.mother);
    let father = load(&conn, &tree, family.father);
    assert!(mother.children.is_empty());
    assert!(father.children.is_empty());
    assert!(mother.has_spouse(family.father));

    service.delete_member(&tree, family.father).unwrap();
    assert!(load(&conn, &tree, family.mother).spouses.is_empty());
    assert_consistent(&conn, &tree);
}

#[test]
fn interrupted_delete_can_be_rerun() {
    let conn = setup();
    let family = seed_family(&conn);
    let members = SqliteMemberStore::try_new(&conn).unwrap();

    // Document removed but references and listing left behind.
    assert!(members.delete_member(family.tree.id, family.father).unwrap());

    let service = relationships(&conn);
    service.delete_member(&family.tree, family.father).unwrap();

    let tree = reload_tree(&conn, &family.tree);
    assert!(!tree.contains_member(family.father));
    assert_eq!(load(&conn, &tree, family.reference).father, None);
    assert_consistent(&conn, &tree);

    let err = service.delete_member(&tree, family.father).unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
}

#[test]
fn delete_sibling_only_accepts_siblings() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let err = service
        .delete_sibling(&family.tree, family.reference)
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidState(_)));

    let sibling = service
        .add_sibling(&family.tree, family.reference, profile("Sib", Gender::Female))
        .unwrap();
    let tree = reload_tree(&conn, &family.tree);
    service.delete_sibling(&tree, sibling.id).unwrap();
    assert_eq!(
        load(&conn, &tree, family.mother).children,
        vec![family.reference]
    );
    assert_consistent(&conn, &tree);
}

#[test]
fn add_child_requires_an_existing_parent() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let no_parent = NewChild {
        profile: profile("Kid", Gender::Male),
        mother_id: None,
        father_id: None,
    };
    let err = service
        .add_child(&family.tree, family.reference, no_parent)
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));

    let unknown_parent = NewChild {
        profile: profile("Kid", Gender::Male),
        mother_id: Some(uuid::Uuid::new_v4()),
        father_id: Some(family.reference),
    };
    let err = service
        .add_child(&family.tree, family.reference, unknown_parent)
        .unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
    assert_eq!(reload_tree(&conn, &family.tree).members.len(), 3);
    assert!(load(&conn, &family.tree, family.reference).children.is_empty());

    let child = service
        .add_child(
            &family.tree,
            family.reference,
            NewChild {
                profile: profile("Kid", Gender::Male),
                mother_id: None,
                father_id: Some(family.reference),
            },
        )
        .unwrap();
    assert_eq!(child.role, MemberRole::Child);
    assert_eq!(
        load(&conn, &family.tree, family.reference).children,
        vec![child.id]
    );
    assert_consistent(&conn, &family.tree);
}

#[test]
fn add_member_propagates_listed_edges() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let partner = NewMember {
        spouses: vec![SpouseLink::new(family.reference, Some("partner".to_string()))],
        ..NewMember::new(profile("Pat", Gender::Female), MemberRole::Spouse)
    };
    let partner = service.add_member(&family.tree, partner).unwrap();
    let reference = load(&conn, &family.tree, family.reference);
    assert_eq!(
        reference.spouses,
        vec![SpouseLink::new(partner.id, Some("partner".to_string()))]
    );

    let grandmother = NewMember {
        children: vec![family.mother],
        ..NewMember::new(profile("Gran", Gender::Female), MemberRole::Mother)
    };
    let grandmother = service.add_member(&family.tree, grandmother).unwrap();
    assert_eq!(
        load(&conn, &family.tree, family.mother).mother,
        Some(grandmother.id)
    );
    assert_consistent(&conn, &family.tree);
}

#[test]
fn add_member_rejects_child_whose_slot_is_taken_before_writing() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let second_mother = NewMember {
        children: vec![family.reference],
        ..NewMember::new(profile("Other", Gender::Female), MemberRole::Mother)
    };
    let err = service
        .add_member(&family.tree, second_mother)
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidState(_)), "{err}");
    assert_eq!(reload_tree(&conn, &family.tree).members.len(), 3);
    assert_eq!(service.list_members(&family.tree).unwrap().len(), 3);
}

#[test]
fn link_parent_infers_slot_from_gender_and_displaces_on_explicit_slot() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let stepmother = service
        .add_member(
            &family.tree,
            NewMember::new(profile("Step", Gender::Female), MemberRole::Spouse),
        )
        .unwrap();

    let err = service
        .link_parent(&family.tree, family.reference, stepmother.id, None)
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidState(_)), "{err}");

    let child = service
        .link_parent(
            &family.tree,
            family.reference,
            stepmother.id,
            Some(ParentSlot::Mother),
        )
        .unwrap();
    assert_eq!(child.mother, Some(stepmother.id));
    assert!(load(&conn, &family.tree, family.mother).children.is_empty());
    assert_eq!(
        load(&conn, &family.tree, stepmother.id).children,
        vec![family.reference]
    );
    assert_consistent(&conn, &family.tree);

    let err = service
        .link_parent(&family.tree, family.reference, family.reference, None)
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));

    let err = service
        .link_parent(
            &family.tree,
            family.reference,
            stepmother.id,
            Some(ParentSlot::Father),
        )
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));
}

#[test]
fn link_parent_with_free_slot_and_other_gender() {
    let conn = setup();
    let tree = new_tree(&conn);
    let service = relationships(&conn);
    let kid = service
        .add_member(&tree, NewMember::new(profile("Kid", Gender::Male), MemberRole::Child))
        .unwrap();
    let parent = service
        .add_member(&tree, NewMember::new(profile("Alex", Gender::Other), MemberRole::Father))
        .unwrap();

    let kid = service.link_parent(&tree, kid.id, parent.id, None).unwrap();
    assert_eq!(kid.mother, Some(parent.id));

    // Relinking is a no-op.
    let kid = service.link_parent(&tree, kid.id, parent.id, None).unwrap();
    assert_eq!(kid.mother, Some(parent.id));
    assert_eq!(load(&conn, &tree, parent.id).children, vec![kid.id]);
    assert_consistent(&conn, &tree);
}

#[test]
fn unlink_removes_both_sides_and_reports_missing_edges() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);
    service
        .link_spouse(&family.tree, family.mother, family.father, None)
        .unwrap();

    let child = service
        .unlink_parent(&family.tree, family.reference, family.father)
        .unwrap();
    assert_eq!(child.father, None);
    assert!(load(&conn, &family.tree, family.father).children.is_empty());

    let err = service
        .unlink_parent(&family.tree, family.reference, family.father)
        .unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));

    let (mother, father) = service
        .unlink_spouse(&family.tree, family.mother, family.father)
        .unwrap();
    assert!(mother.spouses.is_empty());
    assert!(father.spouses.is_empty());

    let err = service
        .unlink_spouse(&family.tree, family.mother, family.father)
        .unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
    assert_consistent(&conn, &family.tree);
}

#[test]
fn members_of_other_trees_are_not_found() {
    let conn = setup();
    let family = seed_family(&conn);
    let other = seed_family(&conn);
    let service = relationships(&conn);

    let err = service
        .link_spouse(&family.tree, family.reference, other.reference, None)
        .unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));

    let err = service
        .get_member(&family.tree, other.mother)
        .unwrap_err();
    assert!(matches!(err, FamilyError::NotFound(_)));
    assert!(load(&conn, &family.tree, family.reference).spouses.is_empty());
}

#[test]
fn update_member_rejects_empty_patch_and_updates_profile() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);

    let err = service
        .update_member(&family.tree, family.reference, MemberPatch::default())
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));

    let patch = MemberPatch {
        first_name: Some("  Samantha ".to_string()),
        biography: Some("Likes trees".to_string()),
        ..MemberPatch::default()
    };
    let updated = service
        .update_member(&family.tree, family.reference, patch)
        .unwrap();
    assert_eq!(updated.profile.first_name, "Samantha");
    assert_eq!(updated.profile.biography.as_deref(), Some("Likes trees"));
    assert_eq!(updated.mother, Some(family.mother));

    let blank = MemberPatch {
        first_name: Some("   ".to_string()),
        ..MemberPatch::default()
    };
    let err = service
        .update_member(&family.tree, family.reference, blank)
        .unwrap_err();
    assert!(matches!(err, FamilyError::InvalidArgument(_)));
}

#[test]
fn update_member_reconciles_relationship_fields_on_both_sides() {
    let conn = setup();
    let family = seed_family(&conn);
    let service = relationships(&conn);
    let partner = service
        .add_member(
            &family.tree,
            NewMember::new(profile("Pat", Gender::Male), MemberRole::Spouse),
        )
        .unwrap();
    let kid = service
        .add_member(&family.tree, NewMember::new(profile("Kid", Gender::Female), MemberRole::Child))
        .unwrap();

    let patch = MemberPatch {
        spouses: Some(vec![SpouseLink::new(partner.id, None)]),
        children: Some(vec![kid.id]),
        ..MemberPatch::default()
    };
    let updated = service
        .update_member(&family.tree, family.mother, patch)
        .unwrap();
    assert_eq!(updated.children, vec![kid.id]);
    assert!(updated.has_spouse(partner.id));
    assert!(load(&conn, &family.tree, partner.id).has_spouse(family.mother));
    assert_eq!(load(&conn, &family.tree, kid.id).mother, Some(family.mother));
    assert_eq!(load(&conn, &family.tree, family.reference).mother, None);
    assert_consistent(&conn, &family.tree);

    let clear = MemberPatch {
        spouses: Some(Vec::new()),
        ..MemberPatch::default()
    };
    service
        .update_member(&family.tree, family.mother, clear)
        .unwrap();
    assert!(load(&conn, &family.tree, partner.id).spouses.is_empty());
    assert_consistent(&conn, &family.tree);
}
