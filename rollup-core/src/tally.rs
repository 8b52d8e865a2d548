//! Summing children's candidate votes and turnout into a parent.

use std::collections::HashMap;

use crate::model::{CandidateKey, CandidateTally, TallySource, VoterCounts};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// How a child's candidates are lined up against the parent's list.
pub enum MatchMode {
    /// Match on first and last name; any disagreement between the lists
    /// fails the unit.
    #[default]
    Identity,
    /// Match on list position, as the original updater did. Slot `j` of a
    /// child only counts when the parent has a slot `j` with the same last
    /// name; anything else is skipped without error.
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Freshly computed tally for one parent.
pub struct Rollup {
    /// Parent candidate list in its original order, votes recomputed.
    pub candidates: Vec<CandidateTally>,
    /// Summed turnout of all children.
    pub counts: VoterCounts,
    /// Child slots dropped by positional matching.
    pub skipped_slots: usize,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reasons a parent cannot be tallied.
pub enum TallyError {
    /// A child lists a candidate the parent does not.
    #[error("child {child} lists unknown candidate {candidate}")]
    UnknownCandidate {
        /// Label of the offending child.
        child: String,
        /// Candidate missing from the parent.
        candidate: CandidateKey,
    },
    /// A child lacks a candidate the parent lists.
    #[error("child {child} does not list candidate {candidate}")]
    MissingCandidate {
        /// Label of the offending child.
        child: String,
        /// Candidate missing from the child.
        candidate: CandidateKey,
    },
    /// A candidate appears twice in one list.
    #[error("{unit} lists candidate {candidate} more than once")]
    DuplicateCandidate {
        /// Label of the parent or child holding the duplicate.
        unit: String,
        /// Repeated candidate.
        candidate: CandidateKey,
    },
    /// A sum no longer fits in the counter.
    #[error("vote count overflow")]
    Overflow,
}

/// Recompute a parent's tally from its children.
///
/// `parent_label` and `child_label` only feed error messages. An empty
/// `children` slice yields all-zero votes and counts.
///
/// # Errors
///
/// Returns a [`TallyError`] when identity matching finds the lists out of
/// line, or when a sum overflows.
pub fn tally<C, F>(
    parent: &[CandidateTally],
    parent_label: &str,
    children: &[C],
    child_label: F,
    mode: MatchMode,
) -> Result<Rollup, TallyError>
where
    C: TallySource,
    F: Fn(&C) -> String,
{
    let mut candidates: Vec<CandidateTally> = parent
        .iter()
        .map(|candidate| CandidateTally {
            votes: 0,
            ..candidate.clone()
        })
        .collect();

    let mut counts = VoterCounts::default();
    for child in children {
        counts = counts.checked_add(child.counts())?;
    }

    let skipped_slots = match mode {
        MatchMode::Identity => {
            let slots = index_by_key(parent, parent_label)?;
            for child in children {
                add_by_identity(&mut candidates, &slots, child, &child_label)?;
            }
            0
        }
        MatchMode::Positional => {
            let mut skipped = 0;
            for child in children {
                skipped += add_by_position(&mut candidates, child.candidates())?;
            }
            skipped
        }
    };

    Ok(Rollup {
        candidates,
        counts,
        skipped_slots,
    })
}

fn index_by_key(
    list: &[CandidateTally],
    label: &str,
) -> Result<HashMap<CandidateKey, usize>, TallyError> {
    let mut slots = HashMap::with_capacity(list.len());
    for (slot, candidate) in list.iter().enumerate() {
        let key = candidate.key();
        if slots.insert(key.clone(), slot).is_some() {
            return Err(TallyError::DuplicateCandidate {
                unit: label.to_owned(),
                candidate: key,
            });
        }
    }
    Ok(slots)
}

fn add_by_identity<C, F>(
    totals: &mut [CandidateTally],
    slots: &HashMap<CandidateKey, usize>,
    child: &C,
    child_label: &F,
) -> Result<(), TallyError>
where
    C: TallySource,
    F: Fn(&C) -> String,
{
    let seen = index_by_key(child.candidates(), &child_label(child))?;

    if let Some(candidate) = slots.keys().find(|key| !seen.contains_key(*key)) {
        return Err(TallyError::MissingCandidate {
            child: child_label(child),
            candidate: candidate.clone(),
        });
    }

    for candidate in child.candidates() {
        let key = candidate.key();
        let total = slots
            .get(&key)
            .and_then(|slot| totals.get_mut(*slot))
            .ok_or_else(|| TallyError::UnknownCandidate {
                child: child_label(child),
                candidate: key,
            })?;
        total.votes = total
            .votes
            .checked_add(candidate.votes)
            .ok_or(TallyError::Overflow)?;
    }
    Ok(())
}

fn add_by_position(
    totals: &mut [CandidateTally],
    child: &[CandidateTally],
) -> Result<usize, TallyError> {
    let mut skipped = 0;
    for (slot, candidate) in child.iter().enumerate() {
        match totals.get_mut(slot) {
            Some(total) if total.last_name == candidate.last_name => {
                total.votes = total
                    .votes
                    .checked_add(candidate.votes)
                    .ok_or(TallyError::Overflow)?;
            }
            _ => skipped += 1,
        }
    }
    Ok(skipped)
}
