//! Member domain model.
//!
//! # Responsibility
//! - Define the person node stored once per tree member.
//! - Provide duplicate-safe edge helpers used by the store's set updates.
//!
//! # Invariants
//! - `tree_id` never changes after creation.
//! - `spouses` and `children` behave as sets: helpers never push duplicates.
//! - A member never references itself through any edge.
//! - `role` is creation-time metadata, not live relationship state.

use crate::model::tree::TreeId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable member identifier.
pub type MemberId = Uuid;

/// Relationship label used when a spouse link does not carry one.
pub const DEFAULT_SPOUSE_RELATIONSHIP: &str = "spouse";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            "Other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Parent slot a member of this gender fills by default.
    ///
    /// `Other` has no default and is resolved against free slots.
    pub fn default_parent_slot(self) -> Option<ParentSlot> {
        match self {
            Self::Female => Some(ParentSlot::Mother),
            Self::Male => Some(ParentSlot::Father),
            Self::Other => None,
        }
    }
}

/// Position of a member relative to the tree's reference person at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// The reference person (`self` on the wire).
    #[serde(rename = "self")]
    Reference,
    Mother,
    Father,
    Sibling,
    Spouse,
    Child,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "self",
            Self::Mother => "mother",
            Self::Father => "father",
            Self::Sibling => "sibling",
            Self::Spouse => "spouse",
            Self::Child => "child",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "self" => Some(Self::Reference),
            "mother" => Some(Self::Mother),
            "father" => Some(Self::Father),
            "sibling" => Some(Self::Sibling),
            "spouse" => Some(Self::Spouse),
            "child" => Some(Self::Child),
            _ => None,
        }
    }

    /// Whether members created with this role must have both parents.
    pub fn requires_parents(self) -> bool {
        matches!(self, Self::Reference)
    }
}

/// One of the two parent fields on a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentSlot {
    Mother,
    Father,
}

impl ParentSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mother => "mother",
            Self::Father => "father",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mother" => Some(Self::Mother),
            "father" => Some(Self::Father),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Mother => Self::Father,
            Self::Father => Self::Mother,
        }
    }
}

/// Spouse edge with an optional free-form label ("married", "partner").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpouseLink {
    pub spouse_id: MemberId,
    pub relationship_type: Option<String>,
}

impl SpouseLink {
    pub fn new(spouse_id: MemberId, relationship_type: Option<String>) -> Self {
        Self {
            spouse_id,
            relationship_type,
        }
    }
}

/// Descriptive fields of a member. Carries no relationship state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub gender: Gender,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub place_of_birth: Option<String>,
    #[serde(default)]
    pub date_of_death: Option<NaiveDate>,
    #[serde(default)]
    pub place_of_death: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
}

impl MemberProfile {
    /// Creates a profile with only the required fields set.
    pub fn new(first_name: impl Into<String>, gender: Gender) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: None,
            gender,
            date_of_birth: None,
            place_of_birth: None,
            date_of_death: None,
            place_of_death: None,
            profile_picture_url: None,
            biography: None,
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }
}

/// One kind of edge leaving a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Mother,
    Father,
    Spouse,
    Child,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mother => "mother",
            Self::Father => "father",
            Self::Spouse => "spouse",
            Self::Child => "child",
        }
    }
}

impl From<ParentSlot> for EdgeKind {
    fn from(value: ParentSlot) -> Self {
        match value {
            ParentSlot::Mother => Self::Mother,
            ParentSlot::Father => Self::Father,
        }
    }
}

/// Record-local member validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValidationError {
    BlankFirstName,
    MissingParent(ParentSlot),
    SelfReference(EdgeKind),
    SameMotherAndFather,
    DeathBeforeBirth,
}

impl Display for MemberValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankFirstName => write!(f, "first name must not be blank"),
            Self::MissingParent(slot) => {
                write!(f, "{} is required for the reference member", slot.as_str())
            }
            Self::SelfReference(edge) => {
                write!(f, "member cannot be its own {}", edge.as_str())
            }
            Self::SameMotherAndFather => {
                write!(f, "mother and father must be different members")
            }
            Self::DeathBeforeBirth => write!(f, "date of death is earlier than date of birth"),
        }
    }
}

impl Error for MemberValidationError {}

/// A person node in one family tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub tree_id: TreeId,
    #[serde(flatten)]
    pub profile: MemberProfile,
    pub role: MemberRole,
    pub mother: Option<MemberId>,
    pub father: Option<MemberId>,
    pub spouses: Vec<SpouseLink>,
    pub children: Vec<MemberId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Member {
    /// Creates an edge-less member with a fresh id.
    pub fn new(tree_id: TreeId, profile: MemberProfile, role: MemberRole) -> Self {
        let now = crate::model::now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            tree_id,
            profile,
            role,
            mother: None,
            father: None,
            spouses: Vec::new(),
            children: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn parent(&self, slot: ParentSlot) -> Option<MemberId> {
        match slot {
            ParentSlot::Mother => self.mother,
            ParentSlot::Father => self.father,
        }
    }

    pub fn set_parent(&mut self, slot: ParentSlot, parent: Option<MemberId>) {
        match slot {
            ParentSlot::Mother => self.mother = parent,
            ParentSlot::Father => self.father = parent,
        }
    }

    /// Slot in which `parent_id` currently appears, if any.
    pub fn slot_of(&self, parent_id: MemberId) -> Option<ParentSlot> {
        if self.mother == Some(parent_id) {
            Some(ParentSlot::Mother)
        } else if self.father == Some(parent_id) {
            Some(ParentSlot::Father)
        } else {
            None
        }
    }

    pub fn has_child(&self, child_id: MemberId) -> bool {
        self.children.contains(&child_id)
    }

    pub fn has_spouse(&self, spouse_id: MemberId) -> bool {
        self.spouses.iter().any(|link| link.spouse_id == spouse_id)
    }

    /// Adds a child id; returns `false` when it was already present.
    pub fn insert_child(&mut self, child_id: MemberId) -> bool {
        if self.has_child(child_id) {
            return false;
        }
        self.children.push(child_id);
        true
    }

    /// Removes a child id; returns `false` when it was absent.
    pub fn remove_child(&mut self, child_id: MemberId) -> bool {
        let before = self.children.len();
        self.children.retain(|id| *id != child_id);
        self.children.len() != before
    }

    /// Adds a spouse link unless one to the same member exists.
    pub fn insert_spouse(&mut self, link: SpouseLink) -> bool {
        if self.has_spouse(link.spouse_id) {
            return false;
        }
        self.spouses.push(link);
        true
    }

    pub fn remove_spouse(&mut self, spouse_id: MemberId) -> bool {
        let before = self.spouses.len();
        self.spouses.retain(|link| link.spouse_id != spouse_id);
        self.spouses.len() != before
    }

    /// Clears every parent field equal to `parent_id`.
    pub fn clear_parent_ref(&mut self, parent_id: MemberId) -> bool {
        let mut changed = false;
        if self.mother == Some(parent_id) {
            self.mother = None;
            changed = true;
        }
        if self.father == Some(parent_id) {
            self.father = None;
            changed = true;
        }
        changed
    }

    /// Every member id this member points at, tagged by edge.
    pub fn edges(&self) -> Vec<(EdgeKind, MemberId)> {
        let mut edges = Vec::with_capacity(2 + self.spouses.len() + self.children.len());
        if let Some(mother) = self.mother {
            edges.push((EdgeKind::Mother, mother));
        }
        if let Some(father) = self.father {
            edges.push((EdgeKind::Father, father));
        }
        edges.extend(
            self.spouses
                .iter()
                .map(|link| (EdgeKind::Spouse, link.spouse_id)),
        );
        edges.extend(self.children.iter().map(|id| (EdgeKind::Child, *id)));
        edges
    }

    /// Validates the creation-time rules on top of [`Member::validate`].
    ///
    /// The reference member must be created with both parents; afterwards a
    /// parent may be cleared again (e.g. when that parent is deleted).
    pub fn validate_new(&self) -> Result<(), MemberValidationError> {
        if self.role.requires_parents() {
            for slot in [ParentSlot::Mother, ParentSlot::Father] {
                if self.parent(slot).is_none() {
                    return Err(MemberValidationError::MissingParent(slot));
                }
            }
        }
        self.validate()
    }

    /// Validates record-local invariants that hold for the member's lifetime.
    ///
    /// Does not check that referenced members exist; that is a
    /// cross-document concern handled by the relationship service.
    pub fn validate(&self) -> Result<(), MemberValidationError> {
        if self.profile.first_name.trim().is_empty() {
            return Err(MemberValidationError::BlankFirstName);
        }
        if let Some((edge, _)) = self.edges().into_iter().find(|(_, id)| *id == self.id) {
            return Err(MemberValidationError::SelfReference(edge));
        }
        if self.mother.is_some() && self.mother == self.father {
            return Err(MemberValidationError::SameMotherAndFather);
        }
        if let (Some(born), Some(died)) = (self.profile.date_of_birth, self.profile.date_of_death)
        {
            if died < born {
                return Err(MemberValidationError::DeathBeforeBirth);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(role: MemberRole) -> Member {
        Member::new(
            Uuid::new_v4(),
            MemberProfile::new("Ada", Gender::Female),
            role,
        )
    }

    #[test]
    fn reference_role_requires_both_parents() {
        let mut reference = member(MemberRole::Reference);
        assert_eq!(
            reference.validate_new(),
            Err(MemberValidationError::MissingParent(ParentSlot::Mother))
        );

        reference.mother = Some(Uuid::new_v4());
        assert_eq!(
            reference.validate_new(),
            Err(MemberValidationError::MissingParent(ParentSlot::Father))
        );

        reference.father = Some(Uuid::new_v4());
        assert!(reference.validate_new().is_ok());
    }

    #[test]
    fn reference_member_may_lose_a_parent_after_creation() {
        let mut reference = member(MemberRole::Reference);
        reference.mother = Some(Uuid::new_v4());
        reference.father = Some(Uuid::new_v4());
        reference.mother = None;
        assert!(reference.validate().is_ok());
    }

    #[test]
    fn rejects_self_reference_on_any_edge() {
        let mut sibling = member(MemberRole::Sibling);
        sibling.insert_spouse(SpouseLink::new(sibling.id, None));
        assert_eq!(
            sibling.validate(),
            Err(MemberValidationError::SelfReference(EdgeKind::Spouse))
        );

        let mut child = member(MemberRole::Child);
        child.father = Some(child.id);
        assert_eq!(
            child.validate(),
            Err(MemberValidationError::SelfReference(EdgeKind::Father))
        );
    }

    #[test]
    fn rejects_blank_name_and_inverted_dates() {
        let mut blank = member(MemberRole::Mother);
        blank.profile.first_name = "   ".to_string();
        assert_eq!(blank.validate(), Err(MemberValidationError::BlankFirstName));

        let mut dated = member(MemberRole::Father);
        dated.profile.date_of_birth = NaiveDate::from_ymd_opt(1950, 3, 1);
        dated.profile.date_of_death = NaiveDate::from_ymd_opt(1949, 12, 31);
        assert_eq!(dated.validate(), Err(MemberValidationError::DeathBeforeBirth));
    }

    #[test]
    fn rejects_same_member_in_both_parent_slots() {
        let mut child = member(MemberRole::Child);
        let parent = Uuid::new_v4();
        child.mother = Some(parent);
        child.father = Some(parent);
        assert_eq!(
            child.validate(),
            Err(MemberValidationError::SameMotherAndFather)
        );
    }

    #[test]
    fn set_helpers_are_duplicate_safe() {
        let mut parent = member(MemberRole::Mother);
        let child = Uuid::new_v4();
        assert!(parent.insert_child(child));
        assert!(!parent.insert_child(child));
        assert_eq!(parent.children, vec![child]);
        assert!(parent.remove_child(child));
        assert!(!parent.remove_child(child));

        let spouse = Uuid::new_v4();
        assert!(parent.insert_spouse(SpouseLink::new(spouse, Some("married".into()))));
        assert!(!parent.insert_spouse(SpouseLink::new(spouse, None)));
        assert_eq!(parent.spouses.len(), 1);
        assert_eq!(parent.spouses[0].relationship_type.as_deref(), Some("married"));
    }

    #[test]
    fn clear_parent_ref_only_touches_matching_slots() {
        let mut child = member(MemberRole::Child);
        let mother = Uuid::new_v4();
        let father = Uuid::new_v4();
        child.mother = Some(mother);
        child.father = Some(father);

        assert!(child.clear_parent_ref(mother));
        assert_eq!(child.mother, None);
        assert_eq!(child.father, Some(father));
        assert!(!child.clear_parent_ref(mother));
    }

    #[test]
    fn wire_names_match_role_and_gender_strings() {
        let json = serde_json::to_value(MemberRole::Reference).expect("serialize role");
        assert_eq!(json, serde_json::json!("self"));
        for role in [
            MemberRole::Reference,
            MemberRole::Mother,
            MemberRole::Father,
            MemberRole::Sibling,
            MemberRole::Spouse,
            MemberRole::Child,
        ] {
            assert_eq!(MemberRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(Gender::parse("Female"), Some(Gender::Female));
        assert_eq!(Gender::parse("female"), None);
    }

    #[test]
    fn gender_uses_capitalized_wire_values() {
        let gender: Gender = serde_json::from_str(r#""Male""#).expect("deserialize gender");
        assert_eq!(gender, Gender::Male);
        assert!(serde_json::from_str::<Gender>(r#""male""#).is_err());
        for gender in [Gender::Male, Gender::Female, Gender::Other] {
            let json = serde_json::to_value(gender).expect("serialize gender");
            assert_eq!(json, serde_json::json!(gender.as_str()));
        }
    }
}
