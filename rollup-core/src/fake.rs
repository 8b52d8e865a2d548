//! In-memory data service used by the engine tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::model::{
    BallotBox, CandidateTally, City, Constituency, District, GeoUnit, LevelKind, Quarter, UnitId,
};
use crate::ports::{GeoDataPort, PortError};

#[derive(Default)]
pub(crate) struct FakeState {
    pub(crate) cities: Vec<City>,
    pub(crate) constituencies: Vec<Constituency>,
    pub(crate) districts: Vec<District>,
    pub(crate) quarters: Vec<Quarter>,
    pub(crate) boxes: Vec<BallotBox>,
    /// Labels whose replace is refused.
    pub(crate) reject_replace: HashSet<String>,
    /// Levels whose full listing fails.
    pub(crate) fail_listing: HashSet<LevelKind>,
    /// Every request fails.
    pub(crate) unreachable: bool,
}

#[derive(Default)]
pub(crate) struct FakePort {
    state: Mutex<FakeState>,
    writes: AtomicUsize,
}

impl FakePort {
    pub(crate) fn with<R>(&self, edit: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().expect("fake state poisoned");
        edit(&mut *state)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn list<T>(
        &self,
        level: Option<LevelKind>,
        pick: impl FnOnce(&FakeState) -> Vec<T>,
    ) -> Result<Vec<T>, PortError> {
        self.with(|state| {
            if state.unreachable || level.is_some_and(|kind| state.fail_listing.contains(&kind)) {
                return Err(PortError::Internal("connection refused".into()));
            }
            Ok(pick(state))
        })
    }

    fn store<T: GeoUnit + Clone>(
        &self,
        unit: &T,
        slot: impl FnOnce(&mut FakeState) -> Option<&mut T>,
    ) -> Result<(), PortError> {
        let label = unit.label();
        self.with(|state| {
            if state.unreachable || state.reject_replace.contains(&label) {
                return Err(PortError::Internal(format!("refused {label}")));
            }
            let stored = slot(state).ok_or_else(|| PortError::Internal(format!("no {label}")))?;
            *stored = unit.clone();
            Ok(())
        })?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl GeoDataPort for FakePort {
    async fn cities(&self) -> Result<Vec<City>, PortError> {
        self.list(Some(LevelKind::City), |state| state.cities.clone())
    }

    async fn constituencies(&self) -> Result<Vec<Constituency>, PortError> {
        self.list(Some(LevelKind::Constituency), |state| state.constituencies.clone())
    }

    async fn districts(&self) -> Result<Vec<District>, PortError> {
        self.list(Some(LevelKind::District), |state| state.districts.clone())
    }

    async fn quarters(&self) -> Result<Vec<Quarter>, PortError> {
        self.list(Some(LevelKind::Quarter), |state| state.quarters.clone())
    }

    async fn constituencies_of_city(&self, city: &City) -> Result<Vec<Constituency>, PortError> {
        self.list(None, |state| {
            state
                .constituencies
                .iter()
                .filter(|unit| unit.city == city.name)
                .cloned()
                .collect()
        })
    }

    async fn districts_of_constituency(
        &self,
        constituency: &Constituency,
    ) -> Result<Vec<District>, PortError> {
        self.list(None, |state| {
            state
                .districts
                .iter()
                .filter(|unit| {
                    unit.city == constituency.city && unit.constituency == constituency.name
                })
                .cloned()
                .collect()
        })
    }

    async fn quarters_of_district(&self, district: &District) -> Result<Vec<Quarter>, PortError> {
        self.list(None, |state| {
            state
                .quarters
                .iter()
                .filter(|unit| unit.city == district.city && unit.district == district.name)
                .cloned()
                .collect()
        })
    }

    async fn boxes_of_quarter(&self, quarter: &Quarter) -> Result<Vec<BallotBox>, PortError> {
        self.list(None, |state| {
            state
                .boxes
                .iter()
                .filter(|unit| {
                    unit.city == quarter.city
                        && unit.district == quarter.district
                        && unit.quarter == quarter.name
                })
                .cloned()
                .collect()
        })
    }

    async fn replace_city(&self, city: &City) -> Result<(), PortError> {
        self.store(city, |state| {
            state.cities.iter_mut().find(|unit| unit.name == city.name)
        })
    }

    async fn replace_constituency(&self, constituency: &Constituency) -> Result<(), PortError> {
        self.store(constituency, |state| {
            state
                .constituencies
                .iter_mut()
                .find(|unit| unit.id == constituency.id)
        })
    }

    async fn replace_district(&self, district: &District) -> Result<(), PortError> {
        self.store(district, |state| {
            state
                .districts
                .iter_mut()
                .find(|unit| unit.city == district.city && unit.name == district.name)
        })
    }

    async fn replace_quarter(&self, quarter: &Quarter) -> Result<(), PortError> {
        self.store(quarter, |state| {
            state.quarters.iter_mut().find(|unit| {
                unit.city == quarter.city
                    && unit.district == quarter.district
                    && unit.name == quarter.name
            })
        })
    }
}

pub(crate) fn candidates(votes: &[(&str, u64)]) -> Vec<CandidateTally> {
    votes
        .iter()
        .map(|(last, count)| CandidateTally::new("X", *last, *count))
        .collect()
}

fn id_for(parts: &[&str]) -> UnitId {
    UnitId(parts.join(":"))
}

pub(crate) fn city(name: &str, votes: &[(&str, u64)]) -> City {
    City {
        id: id_for(&[name]),
        name: name.into(),
        candidates: candidates(votes),
        ..City::default()
    }
}

pub(crate) fn constituency(
    city: &str,
    name: &str,
    eligible_voters: u64,
    votes: &[(&str, u64)],
) -> Constituency {
    Constituency {
        id: id_for(&[city, name]),
        name: name.into(),
        city: city.into(),
        candidates: candidates(votes),
        eligible_voters,
        ..Constituency::default()
    }
}

pub(crate) fn district(
    city: &str,
    constituency: &str,
    name: &str,
    votes: &[(&str, u64)],
) -> District {
    District {
        id: id_for(&[city, name]),
        name: name.into(),
        city: city.into(),
        constituency: constituency.into(),
        candidates: candidates(votes),
        ..District::default()
    }
}

pub(crate) fn quarter(city: &str, district: &str, name: &str, votes: &[(&str, u64)]) -> Quarter {
    Quarter {
        id: id_for(&[city, district, name]),
        name: name.into(),
        city: city.into(),
        district: district.into(),
        candidates: candidates(votes),
        ..Quarter::default()
    }
}

pub(crate) fn box_in(
    city: &str,
    district: &str,
    quarter: &str,
    number: i64,
    eligible_voters: u64,
    votes: &[(&str, u64)],
) -> BallotBox {
    let number_text = number.to_string();
    BallotBox {
        id: id_for(&[city, district, quarter, number_text.as_str()]),
        number,
        city: city.into(),
        district: district.into(),
        quarter: quarter.into(),
        candidates: candidates(votes),
        eligible_voters,
        ..BallotBox::default()
    }
}
