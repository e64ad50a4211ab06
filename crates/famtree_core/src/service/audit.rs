//! Read-only consistency audit of one tree's relationship graph.
//!
//! Reports every violation instead of stopping at the first one, so an
//! interrupted cascade can be located and re-run.

use crate::error::FamilyResult;
use crate::model::member::{EdgeKind, Member, MemberId};
use crate::model::tree::{Tree, TreeId};
use crate::repo::member_repo::MemberStore;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Member document names another tree.
    ForeignMember { member_id: MemberId, tree_id: TreeId },
    /// Member document exists but the tree does not list it.
    UnlistedMember { member_id: MemberId },
    /// Tree lists an id with no member document.
    MissingMember { member_id: MemberId },
    /// Tree lists the same id more than once.
    DuplicateListing { member_id: MemberId },
    /// Edge points at an id with no member document in this tree.
    DanglingEdge {
        member_id: MemberId,
        edge: EdgeKind,
        target: MemberId,
    },
    /// Edge points back at the member itself.
    SelfReference { member_id: MemberId, edge: EdgeKind },
    /// `spouse_id` does not list `member_id` back.
    AsymmetricSpouse {
        member_id: MemberId,
        spouse_id: MemberId,
    },
    /// Parent lists the child, but the child names neither slot after it.
    ChildWithoutParentRef {
        parent_id: MemberId,
        child_id: MemberId,
    },
    /// Child names the parent, but the parent does not list the child.
    ParentWithoutChildRef {
        child_id: MemberId,
        parent_id: MemberId,
    },
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignMember { member_id, tree_id } => {
                write!(f, "member {member_id} belongs to tree {tree_id}")
            }
            Self::UnlistedMember { member_id } => {
                write!(f, "member {member_id} is not in the tree member list")
            }
            Self::MissingMember { member_id } => {
                write!(f, "tree lists missing member {member_id}")
            }
            Self::DuplicateListing { member_id } => {
                write!(f, "tree lists member {member_id} more than once")
            }
            Self::DanglingEdge {
                member_id,
                edge,
                target,
            } => write!(
                f,
                "member {member_id} {} edge points at missing member {target}",
                edge.as_str()
            ),
            Self::SelfReference { member_id, edge } => {
                write!(f, "member {member_id} is its own {}", edge.as_str())
            }
            Self::AsymmetricSpouse {
                member_id,
                spouse_id,
            } => write!(
                f,
                "member {member_id} lists spouse {spouse_id} without a reciprocal link"
            ),
            Self::ChildWithoutParentRef {
                parent_id,
                child_id,
            } => write!(
                f,
                "member {parent_id} lists child {child_id} which names neither parent slot after it"
            ),
            Self::ParentWithoutChildRef {
                child_id,
                parent_id,
            } => write!(
                f,
                "member {child_id} names parent {parent_id} which does not list it as a child"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub tree_id: TreeId,
    pub member_count: usize,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Loads the tree's members and audits them.
pub fn audit_stored_tree<M: MemberStore>(members: &M, tree: &Tree) -> FamilyResult<AuditReport> {
    let stored = members.list_members(tree.id)?;
    Ok(audit_tree(tree, &stored))
}

/// Checks membership, edge targets, spouse symmetry, and parent/child
/// agreement for one tree.
pub fn audit_tree(tree: &Tree, members: &[Member]) -> AuditReport {
    let mut violations = Vec::new();
    let by_id: HashMap<MemberId, &Member> =
        members.iter().map(|member| (member.id, member)).collect();

    let mut listed = HashSet::new();
    for member_id in &tree.members {
        if !listed.insert(*member_id) {
            violations.push(Violation::DuplicateListing {
                member_id: *member_id,
            });
        } else if !by_id.contains_key(member_id) {
            violations.push(Violation::MissingMember {
                member_id: *member_id,
            });
        }
    }

    for member in members {
        if member.tree_id != tree.id {
            violations.push(Violation::ForeignMember {
                member_id: member.id,
                tree_id: member.tree_id,
            });
        }
        if !listed.contains(&member.id) {
            violations.push(Violation::UnlistedMember {
                member_id: member.id,
            });
        }

        for (edge, target) in member.edges() {
            if target == member.id {
                violations.push(Violation::SelfReference {
                    member_id: member.id,
                    edge,
                });
                continue;
            }
            let Some(other) = by_id.get(&target) else {
                violations.push(Violation::DanglingEdge {
                    member_id: member.id,
                    edge,
                    target,
                });
                continue;
            };

            match edge {
                EdgeKind::Spouse if !other.has_spouse(member.id) => {
                    violations.push(Violation::AsymmetricSpouse {
                        member_id: member.id,
                        spouse_id: target,
                    });
                }
                EdgeKind::Child if other.slot_of(member.id).is_none() => {
                    violations.push(Violation::ChildWithoutParentRef {
                        parent_id: member.id,
                        child_id: target,
                    });
                }
                EdgeKind::Mother | EdgeKind::Father if !other.has_child(member.id) => {
                    violations.push(Violation::ParentWithoutChildRef {
                        child_id: member.id,
                        parent_id: target,
                    });
                }
                _ => {}
            }
        }
    }

    AuditReport {
        tree_id: tree.id,
        member_count: members.len(),
        violations,
    }
}
