//! Records exchanged with the results data service and the traits the
//! aggregator uses to read and rewrite their tallies.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::tally::{Rollup, TallyError};

/// Fields of a record this crate does not model, kept so a full replace
/// writes them back unchanged.
pub type ExtraFields = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The four aggregated levels of the geographic hierarchy.
pub enum LevelKind {
    /// Neighbourhood, rolled up from ballot boxes.
    Quarter,
    /// District, rolled up from quarters.
    District,
    /// Electoral constituency, rolled up from districts.
    Constituency,
    /// City, rolled up from constituencies.
    City,
}

impl LevelKind {
    /// Order in which one pass visits the levels. Each level reads the
    /// level written just before it.
    pub const PASS_ORDER: [LevelKind; 4] = [
        LevelKind::Quarter,
        LevelKind::District,
        LevelKind::Constituency,
        LevelKind::City,
    ];
}

impl fmt::Display for LevelKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            LevelKind::Quarter => "quarter",
            LevelKind::District => "district",
            LevelKind::Constituency => "constituency",
            LevelKind::City => "city",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Opaque record identifier assigned by the data service.
pub struct UnitId(pub String);

impl fmt::Display for UnitId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Key used to match candidates across levels. The data has no stable
/// candidate id, so first and last name together identify a candidate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidateKey {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A candidate and the votes counted for them within one unit.
pub struct CandidateTally {
    /// Given name.
    #[serde(rename = "firstname", default)]
    pub first_name: String,
    /// Family name.
    #[serde(rename = "lastname", default)]
    pub last_name: String,
    /// Votes counted.
    #[serde(default)]
    pub votes: u64,
}

impl CandidateTally {
    /// Construct a tally entry.
    #[must_use]
    pub fn new<F: Into<String>, L: Into<String>>(first_name: F, last_name: L, votes: u64) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            votes,
        }
    }

    /// Identity of the candidate.
    #[must_use]
    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Reads a list the service may send as `null` for a record created
/// without one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// The four turnout figures every unit carries.
pub struct VoterCounts {
    /// Registered voters.
    pub eligible_voters: u64,
    /// Voters who turned up.
    pub actual_voters: u64,
    /// Valid ballots.
    pub valid_votes: u64,
    /// Invalid ballots.
    pub invalid_votes: u64,
}

impl VoterCounts {
    /// Field-wise sum.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Overflow`] when any field would overflow.
    pub fn checked_add(self, other: VoterCounts) -> Result<VoterCounts, TallyError> {
        let add = |left: u64, right: u64| left.checked_add(right).ok_or(TallyError::Overflow);
        Ok(VoterCounts {
            eligible_voters: add(self.eligible_voters, other.eligible_voters)?,
            actual_voters: add(self.actual_voters, other.actual_voters)?,
            valid_votes: add(self.valid_votes, other.valid_votes)?,
            invalid_votes: add(self.invalid_votes, other.invalid_votes)?,
        })
    }
}

/// Anything with a candidate list and turnout figures that can feed a
/// parent's tally.
pub trait TallySource {
    /// Candidate tallies in the order the data service stores them.
    fn candidates(&self) -> &[CandidateTally];

    /// Turnout figures.
    fn counts(&self) -> VoterCounts;
}

/// A unit whose tally is recomputed from its children.
pub trait GeoUnit: TallySource {
    /// Level the unit lives on.
    fn level(&self) -> LevelKind;

    /// Human-readable path such as `Ankara/Çankaya/Cevizlidere`.
    fn label(&self) -> String;

    /// Replace the candidate list and turnout figures with a freshly
    /// computed rollup. Identity and hierarchy fields are left alone.
    fn apply(&mut self, rollup: Rollup);
}

// Trait impls shared by every record. The fields themselves stay spelled
// out per struct so the JSON stays flat.
macro_rules! impl_tally_source {
    ($record:ty) => {
        impl TallySource for $record {
            fn candidates(&self) -> &[CandidateTally] {
                &self.candidates
            }

            fn counts(&self) -> VoterCounts {
                VoterCounts {
                    eligible_voters: self.eligible_voters,
                    actual_voters: self.actual_voters,
                    valid_votes: self.valid_votes,
                    invalid_votes: self.invalid_votes,
                }
            }
        }
    };
}

macro_rules! impl_geo_unit {
    ($record:ty, $level:expr, |$unit:ident| $label:expr) => {
        impl_tally_source!($record);

        impl GeoUnit for $record {
            fn level(&self) -> LevelKind {
                $level
            }

            fn label(&self) -> String {
                let $unit = self;
                $label
            }

            fn apply(&mut self, rollup: Rollup) {
                self.candidates = rollup.candidates;
                self.eligible_voters = rollup.counts.eligible_voters;
                self.actual_voters = rollup.counts.actual_voters;
                self.valid_votes = rollup.counts.valid_votes;
                self.invalid_votes = rollup.counts.invalid_votes;
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// A city, the top of the hierarchy.
pub struct City {
    /// Record id.
    #[serde(rename = "_id", default)]
    pub id: UnitId,
    /// City name, e.g. `Ankara`.
    #[serde(default)]
    pub name: String,
    /// Plate number, e.g. `6`.
    #[serde(default)]
    pub number: i64,
    /// Candidate tallies.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidates: Vec<CandidateTally>,
    /// Registered voters.
    #[serde(rename = "eligiblevoters", default)]
    pub eligible_voters: u64,
    /// Voters who turned up.
    #[serde(rename = "actualvoters", default)]
    pub actual_voters: u64,
    /// Valid ballots.
    #[serde(rename = "validvotes", default)]
    pub valid_votes: u64,
    /// Invalid ballots.
    #[serde(rename = "invalidvotes", default)]
    pub invalid_votes: u64,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl_geo_unit!(City, LevelKind::City, |unit| unit.name.clone());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// An electoral constituency inside a city.
pub struct Constituency {
    /// Record id.
    #[serde(rename = "_id", default)]
    pub id: UnitId,
    /// Constituency name, e.g. `ankara-1`.
    #[serde(default)]
    pub name: String,
    /// Parent city name.
    #[serde(default)]
    pub city: String,
    /// Parent city plate number.
    #[serde(rename = "citynumber", default)]
    pub city_number: i64,
    /// Candidate tallies.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidates: Vec<CandidateTally>,
    /// Registered voters.
    #[serde(rename = "eligiblevoters", default)]
    pub eligible_voters: u64,
    /// Voters who turned up.
    #[serde(rename = "actualvoters", default)]
    pub actual_voters: u64,
    /// Valid ballots.
    #[serde(rename = "validvotes", default)]
    pub valid_votes: u64,
    /// Invalid ballots.
    #[serde(rename = "invalidvotes", default)]
    pub invalid_votes: u64,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl_geo_unit!(Constituency, LevelKind::Constituency, |unit| format!(
    "{}/{}",
    unit.city, unit.name
));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// A district, belonging to one constituency of a city.
pub struct District {
    /// Record id.
    #[serde(rename = "_id", default)]
    pub id: UnitId,
    /// District name, e.g. `Çankaya`.
    #[serde(default)]
    pub name: String,
    /// Parent city name.
    #[serde(default)]
    pub city: String,
    /// Parent city plate number.
    #[serde(rename = "citynumber", default)]
    pub city_number: i64,
    /// Parent constituency name.
    #[serde(default)]
    pub constituency: String,
    /// Candidate tallies.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidates: Vec<CandidateTally>,
    /// Registered voters.
    #[serde(rename = "eligiblevoters", default)]
    pub eligible_voters: u64,
    /// Voters who turned up.
    #[serde(rename = "actualvoters", default)]
    pub actual_voters: u64,
    /// Valid ballots.
    #[serde(rename = "validvotes", default)]
    pub valid_votes: u64,
    /// Invalid ballots.
    #[serde(rename = "invalidvotes", default)]
    pub invalid_votes: u64,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl_geo_unit!(District, LevelKind::District, |unit| format!(
    "{}/{}",
    unit.city, unit.name
));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// A quarter (neighbourhood) inside a district.
pub struct Quarter {
    /// Record id.
    #[serde(rename = "_id", default)]
    pub id: UnitId,
    /// Quarter name, e.g. `Cevizlidere`.
    #[serde(default)]
    pub name: String,
    /// Parent city name.
    #[serde(default)]
    pub city: String,
    /// Parent city plate number.
    #[serde(rename = "citynumber", default)]
    pub city_number: i64,
    /// Constituency the quarter votes in.
    #[serde(default)]
    pub constituency: String,
    /// Parent district name.
    #[serde(default)]
    pub district: String,
    /// Candidate tallies.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidates: Vec<CandidateTally>,
    /// Registered voters.
    #[serde(rename = "eligiblevoters", default)]
    pub eligible_voters: u64,
    /// Voters who turned up.
    #[serde(rename = "actualvoters", default)]
    pub actual_voters: u64,
    /// Valid ballots.
    #[serde(rename = "validvotes", default)]
    pub valid_votes: u64,
    /// Invalid ballots.
    #[serde(rename = "invalidvotes", default)]
    pub invalid_votes: u64,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl_geo_unit!(Quarter, LevelKind::Quarter, |unit| format!(
    "{}/{}/{}",
    unit.city, unit.district, unit.name
));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// A physical ballot box. Entered by a separate write path and only ever
/// read here.
pub struct BallotBox {
    /// Record id.
    #[serde(rename = "_id", default)]
    pub id: UnitId,
    /// Box number, e.g. `1001`.
    #[serde(default)]
    pub number: i64,
    /// City name.
    #[serde(default)]
    pub city: String,
    /// City plate number.
    #[serde(rename = "citynumber", default)]
    pub city_number: i64,
    /// Constituency name.
    #[serde(default)]
    pub constituency: String,
    /// District name.
    #[serde(default)]
    pub district: String,
    /// Quarter name.
    #[serde(default)]
    pub quarter: String,
    /// Candidate tallies.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidates: Vec<CandidateTally>,
    /// Registered voters.
    #[serde(rename = "eligiblevoters", default)]
    pub eligible_voters: u64,
    /// Voters who turned up.
    #[serde(rename = "actualvoters", default)]
    pub actual_voters: u64,
    /// Valid ballots.
    #[serde(rename = "validvotes", default)]
    pub valid_votes: u64,
    /// Invalid ballots.
    #[serde(rename = "invalidvotes", default)]
    pub invalid_votes: u64,
    /// Reference to the scanned tally sheet in file storage.
    #[serde(default)]
    pub sst: String,
    /// Reference to the scanned signed count document in file storage.
    #[serde(default)]
    pub sdc: String,
    /// Fields not modelled here.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl_tally_source!(BallotBox);
