//! Compatibility ranking between users
//!
//! A candidate's teach score counts the skills they know that the querying
//! user wants to learn; the learn score counts the skills they want to learn
//! that the querying user knows.

use serde::Serialize;
use std::{cmp::Ordering, collections::BTreeSet};

use crate::models::{
    skill::Skill,
    user::{UserRecord, UserSummary},
};

/// A user together with the skill ids they know and want to learn
#[derive(Debug, Clone)]
pub struct SkillProfile {
    pub user: UserRecord,
    pub known: BTreeSet<i64>,
    pub desired: BTreeSet<i64>,
}

impl SkillProfile {
    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.desired.is_empty()
    }
}

/// A scored candidate
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub user: UserRecord,
    /// Skill ids the candidate can teach the querying user
    pub can_teach: Vec<i64>,
    /// Skill ids the candidate wants to learn from the querying user
    pub wants_to_learn: Vec<i64>,
}

impl RankedCandidate {
    pub fn teach_score(&self) -> usize {
        self.can_teach.len()
    }

    pub fn learn_score(&self) -> usize {
        self.wants_to_learn.len()
    }

    pub fn total_score(&self) -> usize {
        self.teach_score() + self.learn_score()
    }
}

fn rank_order(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.total_score()
        .cmp(&a.total_score())
        .then_with(|| b.teach_score().cmp(&a.teach_score()))
        .then_with(|| b.learn_score().cmp(&a.learn_score()))
        .then_with(|| {
            a.user
                .display_name()
                .to_lowercase()
                .cmp(&b.user.display_name().to_lowercase())
        })
        .then_with(|| a.user.id.cmp(&b.user.id))
}

/// Score and order `candidates` for `me`.
///
/// The querying user and candidates with nothing to exchange are dropped.
pub fn rank_candidates(me: &SkillProfile, candidates: Vec<SkillProfile>) -> Vec<RankedCandidate> {
    if me.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .filter(|candidate| candidate.user.id != me.user.id)
        .map(|candidate| RankedCandidate {
            can_teach: candidate.known.intersection(&me.desired).copied().collect(),
            wants_to_learn: candidate.desired.intersection(&me.known).copied().collect(),
            user: candidate.user,
        })
        .filter(|candidate| candidate.total_score() > 0)
        .collect();

    ranked.sort_by(rank_order);
    ranked
}

/// Candidate as returned by the compatibility endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CompatibleUser {
    pub user: UserSummary,
    pub teach_score: usize,
    pub learn_score: usize,
    pub total_score: usize,
    pub can_teach: Vec<Skill>,
    pub wants_to_learn: Vec<Skill>,
}

impl CompatibleUser {
    /// Resolve skill ids through `lookup`; unknown ids are skipped
    pub fn new<'a>(
        candidate: &RankedCandidate,
        lookup: impl Fn(i64) -> Option<&'a Skill>,
    ) -> Self {
        let resolve = |ids: &[i64]| -> Vec<Skill> {
            ids.iter().filter_map(|id| lookup(*id)).cloned().collect()
        };
        Self {
            user: UserSummary::from(&candidate.user),
            teach_score: candidate.teach_score(),
            learn_score: candidate.learn_score(),
            total_score: candidate.total_score(),
            can_teach: resolve(&candidate.can_teach),
            wants_to_learn: resolve(&candidate.wants_to_learn),
        }
    }
}
