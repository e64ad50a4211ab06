//! Relationship mutator: the only writer of member edges.
//!
//! # Responsibility
//! - Create members and wire their parent/child/spouse edges on both sides.
//! - Link and unlink relationships between existing members.
//! - Cascade member deletion so no other document keeps a dangling id.
//!
//! # Invariants
//! - All input validation and reference lookups finish before the first write.
//! - Writes are a bounded sequence of idempotent single-document updates:
//!   re-running an interrupted operation converges to the same graph.
//! - `X in Y.children` iff `Y` is `X.mother` or `X.father`.
//! - Spouse edges are symmetric.
//! - A deleted member's document is removed last.

use crate::error::{FamilyError, FamilyResult};
use crate::model::member::{
    Gender, Member, MemberId, MemberProfile, MemberRole, ParentSlot, SpouseLink,
    DEFAULT_SPOUSE_RELATIONSHIP,
};
use crate::model::tree::{Tree, TreeId};
use crate::repo::member_repo::MemberStore;
use crate::repo::tree_repo::TreeStore;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Input for a member created with explicit edges.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    #[serde(flatten)]
    pub profile: MemberProfile,
    pub role: MemberRole,
    #[serde(default)]
    pub mother: Option<MemberId>,
    #[serde(default)]
    pub father: Option<MemberId>,
    #[serde(default)]
    pub spouses: Vec<SpouseLink>,
    #[serde(default)]
    pub children: Vec<MemberId>,
}

impl NewMember {
    pub fn new(profile: MemberProfile, role: MemberRole) -> Self {
        Self {
            profile,
            role,
            mother: None,
            father: None,
            spouses: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_parents(mut self, mother: MemberId, father: MemberId) -> Self {
        self.mother = Some(mother);
        self.father = Some(father);
        self
    }
}

/// Input for `add_child`: the child's profile plus at least one parent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChild {
    #[serde(flatten)]
    pub profile: MemberProfile,
    #[serde(default)]
    pub mother_id: Option<MemberId>,
    #[serde(default)]
    pub father_id: Option<MemberId>,
}

/// Input for `add_spouse`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSpouse {
    #[serde(flatten)]
    pub profile: MemberProfile,
    #[serde(default)]
    pub relationship_type: Option<String>,
}

/// Partial member update. Absent fields are left untouched.
///
/// Optional text fields are cleared by sending an empty string. Relationship
/// fields are applied through the same link/unlink paths as the dedicated
/// operations, so both sides of every edge stay in sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub date_of_death: Option<NaiveDate>,
    pub place_of_death: Option<String>,
    pub profile_picture_url: Option<String>,
    pub biography: Option<String>,
    pub mother: Option<MemberId>,
    pub father: Option<MemberId>,
    pub spouses: Option<Vec<SpouseLink>>,
    pub children: Option<Vec<MemberId>>,
}

impl MemberPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn touches_profile(&self) -> bool {
        self.first_name.is_some()
            || self.last_name.is_some()
            || self.gender.is_some()
            || self.date_of_birth.is_some()
            || self.place_of_birth.is_some()
            || self.date_of_death.is_some()
            || self.place_of_death.is_some()
            || self.profile_picture_url.is_some()
            || self.biography.is_some()
    }

    fn apply_profile(&self, profile: &mut MemberProfile) {
        if let Some(first_name) = &self.first_name {
            profile.first_name = first_name.trim().to_string();
        }
        if let Some(gender) = self.gender {
            profile.gender = gender;
        }
        if let Some(date) = self.date_of_birth {
            profile.date_of_birth = Some(date);
        }
        if let Some(date) = self.date_of_death {
            profile.date_of_death = Some(date);
        }
        patch_text(&mut profile.last_name, &self.last_name);
        patch_text(&mut profile.place_of_birth, &self.place_of_birth);
        patch_text(&mut profile.place_of_death, &self.place_of_death);
        patch_text(&mut profile.profile_picture_url, &self.profile_picture_url);
        patch_text(&mut profile.biography, &self.biography);
    }
}

/// Counts of documents touched by a delete cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub member_id: MemberId,
    pub children_sets_updated: usize,
    pub parent_refs_cleared: usize,
    pub spouse_sets_updated: usize,
}

/// Planned parent edge, checked before any write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParentLinkPlan {
    child_id: MemberId,
    parent_id: MemberId,
    slot: ParentSlot,
    /// Previous holder of `slot`, which loses the child.
    displaced: Option<MemberId>,
}

/// Relationship mutator over member and tree stores.
pub struct RelationshipService<M: MemberStore, T: TreeStore> {
    members: M,
    trees: T,
}

impl<M: MemberStore, T: TreeStore> RelationshipService<M, T> {
    pub fn new(members: M, trees: T) -> Self {
        Self { members, trees }
    }

    pub fn get_member(&self, tree: &Tree, member_id: MemberId) -> FamilyResult<Member> {
        self.load(tree.id, member_id)
    }

    /// Members of the tree in creation order.
    pub fn list_members(&self, tree: &Tree) -> FamilyResult<Vec<Member>> {
        Ok(self.members.list_members(tree.id)?)
    }

    /// Creates a member and propagates every listed edge to its other end.
    ///
    /// # Errors
    /// - `InvalidArgument` for a blank name or a `self` member without both parents.
    /// - `NotFound` when a referenced member is not in this tree.
    /// - `InvalidState` when a listed child already has a different parent
    ///   in the slot this member would take.
    pub fn add_member(&self, tree: &Tree, draft: NewMember) -> FamilyResult<Member> {
        let mut member = Member::new(tree.id, draft.profile, draft.role);
        member.mother = draft.mother;
        member.father = draft.father;
        for link in draft.spouses {
            member.insert_spouse(with_default_label(link));
        }
        for child_id in draft.children {
            member.insert_child(child_id);
        }
        member.validate_new()?;

        for (_, parent_id) in parent_refs(&member) {
            self.load(tree.id, parent_id)?;
        }
        for link in &member.spouses {
            self.load(tree.id, link.spouse_id)?;
        }
        let mut child_plans = Vec::with_capacity(member.children.len());
        for child_id in &member.children {
            let child = self.load(tree.id, *child_id)?;
            child_plans.push(plan_parent_link(&child, &member, None)?);
        }

        self.members.insert_member(&member)?;
        self.trees.push_member(tree.id, member.id)?;
        for (_, parent_id) in parent_refs(&member) {
            self.members.add_child(tree.id, parent_id, member.id)?;
        }
        for link in &member.spouses {
            let reciprocal = SpouseLink::new(member.id, link.relationship_type.clone());
            self.members.add_spouse(tree.id, link.spouse_id, &reciprocal)?;
        }
        for plan in &child_plans {
            self.apply_parent_link(tree.id, plan)?;
        }

        info!(
            "event=member_add module=relationship status=ok tree_id={} member_id={} role={} parents={} spouses={} children={}",
            tree.id,
            member.id,
            member.role.as_str(),
            parent_refs(&member).len(),
            member.spouses.len(),
            member.children.len()
        );
        Ok(member)
    }

    /// Creates a child of `member_id` with the given mother and/or father.
    pub fn add_child(
        &self,
        tree: &Tree,
        member_id: MemberId,
        draft: NewChild,
    ) -> FamilyResult<Member> {
        self.load(tree.id, member_id)?;
        if draft.mother_id.is_none() && draft.father_id.is_none() {
            return Err(FamilyError::InvalidArgument(
                "at least one parent (motherId or fatherId) must be specified".to_string(),
            ));
        }

        let mut child = Member::new(tree.id, draft.profile, MemberRole::Child);
        child.mother = draft.mother_id;
        child.father = draft.father_id;
        child.validate_new()?;
        for (_, parent_id) in parent_refs(&child) {
            self.load(tree.id, parent_id)?;
        }

        self.members.insert_member(&child)?;
        self.trees.push_member(tree.id, child.id)?;
        for (_, parent_id) in parent_refs(&child) {
            self.members.add_child(tree.id, parent_id, child.id)?;
        }

        info!(
            "event=member_add module=relationship status=ok tree_id={} member_id={} role=child anchor_id={}",
            tree.id, child.id, member_id
        );
        Ok(child)
    }

    /// Creates a sibling sharing both parents of `member_id`.
    ///
    /// # Errors
    /// - `InvalidState` when the reference member lacks a mother or father.
    pub fn add_sibling(
        &self,
        tree: &Tree,
        member_id: MemberId,
        profile: MemberProfile,
    ) -> FamilyResult<Member> {
        let anchor = self.load(tree.id, member_id)?;
        let (Some(mother), Some(father)) = (anchor.mother, anchor.father) else {
            return Err(FamilyError::InvalidState(
                "cannot add sibling: member must have both parents defined".to_string(),
            ));
        };

        let mut sibling = Member::new(tree.id, profile, MemberRole::Sibling);
        sibling.mother = Some(mother);
        sibling.father = Some(father);
        sibling.validate_new()?;

        self.members.insert_member(&sibling)?;
        self.trees.push_member(tree.id, sibling.id)?;
        self.members.add_child(tree.id, mother, sibling.id)?;
        self.members.add_child(tree.id, father, sibling.id)?;

        info!(
            "event=member_add module=relationship status=ok tree_id={} member_id={} role=sibling anchor_id={}",
            tree.id, sibling.id, member_id
        );
        Ok(sibling)
    }

    /// Creates a spouse of `member_id` with reciprocal spouse links.
    pub fn add_spouse(
        &self,
        tree: &Tree,
        member_id: MemberId,
        draft: NewSpouse,
    ) -> FamilyResult<Member> {
        self.load(tree.id, member_id)?;
        let label = relationship_label(draft.relationship_type);

        let mut spouse = Member::new(tree.id, draft.profile, MemberRole::Spouse);
        spouse.insert_spouse(SpouseLink::new(member_id, Some(label.clone())));
        spouse.validate_new()?;

        self.members.insert_member(&spouse)?;
        self.trees.push_member(tree.id, spouse.id)?;
        self.members
            .add_spouse(tree.id, member_id, &SpouseLink::new(spouse.id, Some(label)))?;

        info!(
            "event=member_add module=relationship status=ok tree_id={} member_id={} role=spouse anchor_id={}",
            tree.id, spouse.id, member_id
        );
        Ok(spouse)
    }

    /// Makes `parent_id` a parent of `child_id`.
    ///
    /// Without an explicit `slot` the parent's gender decides: female links
    /// as mother, male as father, other takes the first free slot. An
    /// explicit slot replaces its previous holder.
    ///
    /// # Errors
    /// - `InvalidArgument` for a self link or a member linked into both slots.
    /// - `NotFound` when either member is not in this tree.
    /// - `InvalidState` when the inferred slot is held by another member.
    pub fn link_parent(
        &self,
        tree: &Tree,
        child_id: MemberId,
        parent_id: MemberId,
        slot: Option<ParentSlot>,
    ) -> FamilyResult<Member> {
        if child_id == parent_id {
            return Err(FamilyError::InvalidArgument(
                "cannot link member to self as parent".to_string(),
            ));
        }
        let child = self.load(tree.id, child_id)?;
        let parent = self.load(tree.id, parent_id)?;
        let plan = plan_parent_link(&child, &parent, slot)?;

        self.apply_parent_link(tree.id, &plan)?;

        info!(
            "event=parent_link module=relationship status=ok tree_id={} child_id={} parent_id={} slot={} displaced={}",
            tree.id,
            child_id,
            parent_id,
            plan.slot.as_str(),
            plan.displaced.is_some()
        );
        self.load(tree.id, child_id)
    }

    /// Removes the parent edge between `child_id` and `parent_id` on both sides.
    pub fn unlink_parent(
        &self,
        tree: &Tree,
        child_id: MemberId,
        parent_id: MemberId,
    ) -> FamilyResult<Member> {
        let child = self.load(tree.id, child_id)?;
        let slot = child.slot_of(parent_id);
        let parent_lists_child = self
            .members
            .get_member(tree.id, parent_id)?
            .is_some_and(|parent| parent.has_child(child_id));
        if slot.is_none() && !parent_lists_child {
            return Err(FamilyError::NotFound(format!(
                "member {parent_id} is not a parent of {child_id}"
            )));
        }

        self.apply_parent_unlink(tree.id, child_id, parent_id, slot)?;

        info!(
            "event=parent_unlink module=relationship status=ok tree_id={} child_id={} parent_id={}",
            tree.id, child_id, parent_id
        );
        self.load(tree.id, child_id)
    }

    /// Links two members as spouses. Existing links are kept as they are.
    pub fn link_spouse(
        &self,
        tree: &Tree,
        member_id: MemberId,
        spouse_id: MemberId,
        relationship_type: Option<String>,
    ) -> FamilyResult<(Member, Member)> {
        if member_id == spouse_id {
            return Err(FamilyError::InvalidArgument(
                "cannot link member to self as spouse".to_string(),
            ));
        }
        self.load(tree.id, member_id)?;
        self.load(tree.id, spouse_id)?;
        let label = relationship_label(relationship_type);

        self.link_spouse_pair(tree.id, member_id, spouse_id, &label)?;

        info!(
            "event=spouse_link module=relationship status=ok tree_id={} member_id={} spouse_id={}",
            tree.id, member_id, spouse_id
        );
        Ok((self.load(tree.id, member_id)?, self.load(tree.id, spouse_id)?))
    }

    /// Removes the spouse edge on both sides.
    pub fn unlink_spouse(
        &self,
        tree: &Tree,
        member_id: MemberId,
        spouse_id: MemberId,
    ) -> FamilyResult<(Member, Member)> {
        if member_id == spouse_id {
            return Err(FamilyError::InvalidArgument(
                "cannot unlink member from self".to_string(),
            ));
        }
        let member = self.load(tree.id, member_id)?;
        let spouse = self.load(tree.id, spouse_id)?;
        if !member.has_spouse(spouse_id) && !spouse.has_spouse(member_id) {
            return Err(FamilyError::NotFound(format!(
                "members {member_id} and {spouse_id} are not spouses"
            )));
        }

        self.members.remove_spouse(tree.id, member_id, spouse_id)?;
        self.members.remove_spouse(tree.id, spouse_id, member_id)?;

        info!(
            "event=spouse_unlink module=relationship status=ok tree_id={} member_id={} spouse_id={}",
            tree.id, member_id, spouse_id
        );
        Ok((self.load(tree.id, member_id)?, self.load(tree.id, spouse_id)?))
    }

    /// Deletes a member and scrubs its id from every document of the tree.
    ///
    /// A member whose document is gone but whose id is still listed by the
    /// tree is treated as an interrupted delete and cleaned up again.
    pub fn delete_member(&self, tree: &Tree, member_id: MemberId) -> FamilyResult<DeleteSummary> {
        let exists = self.members.get_member(tree.id, member_id)?.is_some();
        if !exists && !tree.contains_member(member_id) {
            return Err(FamilyError::member_not_found(member_id));
        }

        self.trees.pull_member(tree.id, member_id)?;
        let summary = DeleteSummary {
            member_id,
            children_sets_updated: self.members.pull_child_everywhere(tree.id, member_id)?,
            parent_refs_cleared: self.members.clear_parent_everywhere(tree.id, member_id)?,
            spouse_sets_updated: self.members.pull_spouse_everywhere(tree.id, member_id)?,
        };
        self.members.delete_member(tree.id, member_id)?;

        info!(
            "event=member_delete module=relationship status=ok tree_id={} member_id={} children_sets={} parent_refs={} spouse_sets={} resumed={}",
            tree.id,
            member_id,
            summary.children_sets_updated,
            summary.parent_refs_cleared,
            summary.spouse_sets_updated,
            !exists
        );
        Ok(summary)
    }

    /// Deletes a member created as a sibling.
    pub fn delete_sibling(&self, tree: &Tree, member_id: MemberId) -> FamilyResult<DeleteSummary> {
        let member = self.load(tree.id, member_id)?;
        if member.role != MemberRole::Sibling {
            return Err(FamilyError::InvalidState(format!(
                "member {member_id} is not a sibling"
            )));
        }
        self.delete_member(tree, member_id)
    }

    /// Applies a partial update; relationship fields are reconciled on both sides.
    ///
    /// # Errors
    /// - `InvalidArgument` for an empty patch or a patch that breaks member rules.
    /// - `NotFound` when the member or a referenced member is not in this tree.
    /// - `InvalidState` when a new child already has another parent in the
    ///   slot this member would take.
    pub fn update_member(
        &self,
        tree: &Tree,
        member_id: MemberId,
        patch: MemberPatch,
    ) -> FamilyResult<Member> {
        if patch.is_empty() {
            return Err(FamilyError::InvalidArgument(
                "no update fields provided".to_string(),
            ));
        }

        let current = self.load(tree.id, member_id)?;
        let mut updated = current.clone();
        patch.apply_profile(&mut updated.profile);
        updated.validate()?;

        // Edge plans are checked against a working copy so later plans see
        // the effect of earlier ones.
        let mut working = updated.clone();
        let mut parent_links = Vec::new();
        for (slot, requested) in [
            (ParentSlot::Mother, patch.mother),
            (ParentSlot::Father, patch.father),
        ] {
            let Some(parent_id) = requested else {
                continue;
            };
            if parent_id == member_id {
                return Err(FamilyError::InvalidArgument(
                    "cannot link member to self as parent".to_string(),
                ));
            }
            let parent = self.load(tree.id, parent_id)?;
            let plan = plan_parent_link(&working, &parent, Some(slot))?;
            working.set_parent(slot, Some(parent_id));
            parent_links.push(plan);
        }

        let mut spouse_unlinks = Vec::new();
        let mut spouse_links = Vec::new();
        if let Some(requested) = &patch.spouses {
            let mut desired: Vec<SpouseLink> = Vec::new();
            for link in requested {
                if link.spouse_id == member_id {
                    return Err(FamilyError::InvalidArgument(
                        "cannot link member to self as spouse".to_string(),
                    ));
                }
                if desired.iter().all(|kept| kept.spouse_id != link.spouse_id) {
                    desired.push(with_default_label(link.clone()));
                }
            }
            for link in &desired {
                self.load(tree.id, link.spouse_id)?;
            }
            for existing in &current.spouses {
                match desired.iter().find(|link| link.spouse_id == existing.spouse_id) {
                    Some(link) if link.relationship_type == existing.relationship_type => {}
                    _ => spouse_unlinks.push(existing.spouse_id),
                }
            }
            for link in desired {
                let unchanged = current
                    .spouses
                    .iter()
                    .any(|existing| *existing == link);
                if !unchanged {
                    spouse_links.push(link);
                }
            }
        }

        let mut child_unlinks = Vec::new();
        if let Some(requested) = &patch.children {
            let desired: HashSet<MemberId> = requested.iter().copied().collect();
            if desired.contains(&member_id) {
                return Err(FamilyError::InvalidArgument(
                    "cannot link member to self as child".to_string(),
                ));
            }
            for child_id in &current.children {
                if !desired.contains(child_id) {
                    let slot = self
                        .members
                        .get_member(tree.id, *child_id)?
                        .and_then(|child| child.slot_of(member_id));
                    child_unlinks.push((*child_id, slot));
                }
            }
            let mut seen = HashSet::new();
            for child_id in requested {
                if current.has_child(*child_id) || !seen.insert(*child_id) {
                    continue;
                }
                let child = self.load(tree.id, *child_id)?;
                parent_links.push(plan_parent_link(&child, &working, None)?);
            }
        }

        if patch.touches_profile() {
            self.members.update_member(&updated)?;
        }
        for plan in &parent_links {
            self.apply_parent_link(tree.id, plan)?;
        }
        for (child_id, slot) in child_unlinks {
            self.apply_parent_unlink(tree.id, child_id, member_id, slot)?;
        }
        for spouse_id in spouse_unlinks {
            self.members.remove_spouse(tree.id, member_id, spouse_id)?;
            self.members.remove_spouse(tree.id, spouse_id, member_id)?;
        }
        for link in &spouse_links {
            let label = link
                .relationship_type
                .clone()
                .unwrap_or_else(|| DEFAULT_SPOUSE_RELATIONSHIP.to_string());
            self.link_spouse_pair(tree.id, member_id, link.spouse_id, &label)?;
        }

        info!(
            "event=member_update module=relationship status=ok tree_id={} member_id={} profile={} parent_links={} spouse_links={}",
            tree.id,
            member_id,
            patch.touches_profile(),
            parent_links.len(),
            spouse_links.len()
        );
        self.load(tree.id, member_id)
    }

    fn load(&self, tree_id: TreeId, member_id: MemberId) -> FamilyResult<Member> {
        self.members
            .get_member(tree_id, member_id)?
            .ok_or_else(|| FamilyError::member_not_found(member_id))
    }

    fn apply_parent_link(&self, tree_id: TreeId, plan: &ParentLinkPlan) -> FamilyResult<()> {
        self.members
            .set_parent(tree_id, plan.child_id, plan.slot, Some(plan.parent_id))?;
        self.members
            .add_child(tree_id, plan.parent_id, plan.child_id)?;
        if let Some(previous) = plan.displaced {
            self.members
                .remove_child(tree_id, previous, plan.child_id)?;
        }
        Ok(())
    }

    fn apply_parent_unlink(
        &self,
        tree_id: TreeId,
        child_id: MemberId,
        parent_id: MemberId,
        slot: Option<ParentSlot>,
    ) -> FamilyResult<()> {
        if let Some(slot) = slot {
            self.members.set_parent(tree_id, child_id, slot, None)?;
        }
        self.members.remove_child(tree_id, parent_id, child_id)?;
        Ok(())
    }

    fn link_spouse_pair(
        &self,
        tree_id: TreeId,
        member_id: MemberId,
        spouse_id: MemberId,
        label: &str,
    ) -> FamilyResult<()> {
        self.members.add_spouse(
            tree_id,
            member_id,
            &SpouseLink::new(spouse_id, Some(label.to_string())),
        )?;
        self.members.add_spouse(
            tree_id,
            spouse_id,
            &SpouseLink::new(member_id, Some(label.to_string())),
        )?;
        Ok(())
    }
}

/// Decides which slot `parent` takes on `child`, without writing.
fn plan_parent_link(
    child: &Member,
    parent: &Member,
    slot: Option<ParentSlot>,
) -> FamilyResult<ParentLinkPlan> {
    if child.id == parent.id {
        return Err(FamilyError::InvalidArgument(
            "cannot link member to self as parent".to_string(),
        ));
    }

    let slot = match slot {
        Some(slot) => slot,
        None => infer_parent_slot(child, parent)?,
    };
    if child.parent(slot.other()) == Some(parent.id) {
        return Err(FamilyError::InvalidArgument(format!(
            "member {} is already the {} of {}",
            parent.id,
            slot.other().as_str(),
            child.id
        )));
    }

    Ok(ParentLinkPlan {
        child_id: child.id,
        parent_id: parent.id,
        slot,
        displaced: child.parent(slot).filter(|holder| *holder != parent.id),
    })
}

fn infer_parent_slot(child: &Member, parent: &Member) -> FamilyResult<ParentSlot> {
    if let Some(existing) = child.slot_of(parent.id) {
        return Ok(existing);
    }

    let slot = match parent.profile.gender.default_parent_slot() {
        Some(slot) => slot,
        None => [ParentSlot::Mother, ParentSlot::Father]
            .into_iter()
            .find(|slot| child.parent(*slot).is_none())
            .ok_or_else(|| {
                FamilyError::InvalidState(format!(
                    "member {} already has both parents",
                    child.id
                ))
            })?,
    };
    if child.parent(slot).is_some() {
        return Err(FamilyError::InvalidState(format!(
            "member {} already has a {}",
            child.id,
            slot.as_str()
        )));
    }
    Ok(slot)
}

fn parent_refs(member: &Member) -> Vec<(ParentSlot, MemberId)> {
    [ParentSlot::Mother, ParentSlot::Father]
        .into_iter()
        .filter_map(|slot| member.parent(slot).map(|id| (slot, id)))
        .collect()
}

fn relationship_label(relationship_type: Option<String>) -> String {
    relationship_type
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_SPOUSE_RELATIONSHIP.to_string())
}

fn with_default_label(link: SpouseLink) -> SpouseLink {
    SpouseLink::new(link.spouse_id, Some(relationship_label(link.relationship_type)))
}

fn patch_text(field: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        let trimmed = value.trim();
        *field = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::{infer_parent_slot, plan_parent_link, relationship_label, MemberPatch};
    use crate::error::FamilyError;
    use crate::model::member::{Gender, Member, MemberProfile, MemberRole, ParentSlot};
    use uuid::Uuid;

    fn member(name: &str, gender: Gender) -> Member {
        Member::new(
            Uuid::nil(),
            MemberProfile::new(name, gender),
            MemberRole::Child,
        )
    }

    #[test]
    fn gender_picks_the_inferred_slot() {
        let child = member("Kid", Gender::Other);
        let mother = member("Ma", Gender::Female);
        let father = member("Pa", Gender::Male);
        assert_eq!(infer_parent_slot(&child, &mother).unwrap(), ParentSlot::Mother);
        assert_eq!(infer_parent_slot(&child, &father).unwrap(), ParentSlot::Father);
    }

    #[test]
    fn other_gender_takes_first_free_slot() {
        let mut child = member("Kid", Gender::Other);
        let parent = member("Pat", Gender::Other);
        assert_eq!(infer_parent_slot(&child, &parent).unwrap(), ParentSlot::Mother);

        child.mother = Some(Uuid::new_v4());
        assert_eq!(infer_parent_slot(&child, &parent).unwrap(), ParentSlot::Father);

        child.father = Some(Uuid::new_v4());
        let err = infer_parent_slot(&child, &parent).unwrap_err();
        assert!(matches!(err, FamilyError::InvalidState(_)));
    }

    #[test]
    fn inferred_slot_held_by_someone_else_is_rejected() {
        let mut child = member("Kid", Gender::Male);
        child.mother = Some(Uuid::new_v4());
        let second_mother = member("Ma", Gender::Female);
        let err = plan_parent_link(&child, &second_mother, None).unwrap_err();
        assert!(matches!(err, FamilyError::InvalidState(_)));
    }

    #[test]
    fn explicit_slot_displaces_previous_holder() {
        let previous = Uuid::new_v4();
        let mut child = member("Kid", Gender::Male);
        child.mother = Some(previous);
        let replacement = member("Ma", Gender::Female);

        let plan = plan_parent_link(&child, &replacement, Some(ParentSlot::Mother)).unwrap();
        assert_eq!(plan.slot, ParentSlot::Mother);
        assert_eq!(plan.displaced, Some(previous));
    }

    #[test]
    fn linking_into_both_slots_is_rejected() {
        let parent = member("Pat", Gender::Other);
        let mut child = member("Kid", Gender::Male);
        child.mother = Some(parent.id);
        let err = plan_parent_link(&child, &parent, Some(ParentSlot::Father)).unwrap_err();
        assert!(matches!(err, FamilyError::InvalidArgument(_)));
    }

    #[test]
    fn relinking_the_same_parent_is_a_no_op_plan() {
        let parent = member("Ma", Gender::Female);
        let mut child = member("Kid", Gender::Male);
        child.mother = Some(parent.id);
        let plan = plan_parent_link(&child, &parent, None).unwrap();
        assert_eq!(plan.slot, ParentSlot::Mother);
        assert_eq!(plan.displaced, None);
    }

    #[test]
    fn blank_relationship_label_falls_back_to_spouse() {
        assert_eq!(relationship_label(None), "spouse");
        assert_eq!(relationship_label(Some("  ".to_string())), "spouse");
        assert_eq!(relationship_label(Some(" partner ".to_string())), "partner");
    }

    #[test]
    fn patch_ignores_unknown_fields_and_reports_empty() {
        let patch: MemberPatch =
            serde_json::from_str(r#"{"role":"mother","treeId":"x"}"#).unwrap();
        assert!(patch.is_empty());

        let patch: MemberPatch = serde_json::from_str(r#"{"biography":""}"#).unwrap();
        assert!(!patch.is_empty());
        let mut profile = MemberProfile::new("Ada", Gender::Female);
        profile.biography = Some("old".to_string());
        patch.apply_profile(&mut profile);
        assert_eq!(profile.biography, None);
    }
}
