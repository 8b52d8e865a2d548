//! The four parent/child relations a pass walks through.

use async_trait::async_trait;

use crate::model::{
    BallotBox, City, Constituency, District, GeoUnit, LevelKind, Quarter, TallySource,
};
use crate::ports::{GeoDataPort, PortError};

#[async_trait]
/// One aggregated level: where its units come from, how to find their
/// children one level down, and how to write a unit back.
pub trait Level: Send + Sync + 'static {
    /// Level this relation recomputes.
    const KIND: LevelKind;

    /// Unit recomputed at this level.
    type Parent: GeoUnit + Send + Sync + 'static;
    /// Unit one level down that feeds the parent.
    type Child: TallySource + Send + Sync + 'static;

    /// All units of this level.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the data service request fails.
    async fn parents(port: &dyn GeoDataPort) -> Result<Vec<Self::Parent>, PortError>;

    /// Children of one unit.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the data service request fails.
    async fn children(
        port: &dyn GeoDataPort,
        parent: &Self::Parent,
    ) -> Result<Vec<Self::Child>, PortError>;

    /// Write a recomputed unit back in full.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the data service rejects the write.
    async fn replace(port: &dyn GeoDataPort, parent: &Self::Parent) -> Result<(), PortError>;

    /// Label of a child for log lines and error messages.
    fn child_label(child: &Self::Child) -> String;
}

/// Quarters, rolled up from their ballot boxes.
pub struct QuarterLevel;

/// Districts, rolled up from their quarters.
pub struct DistrictLevel;

/// Constituencies, rolled up from their districts.
pub struct ConstituencyLevel;

/// Cities, rolled up from their constituencies.
pub struct CityLevel;

#[async_trait]
impl Level for QuarterLevel {
    const KIND: LevelKind = LevelKind::Quarter;

    type Parent = Quarter;
    type Child = BallotBox;

    async fn parents(port: &dyn GeoDataPort) -> Result<Vec<Quarter>, PortError> {
        port.quarters().await
    }

    async fn children(
        port: &dyn GeoDataPort,
        parent: &Quarter,
    ) -> Result<Vec<BallotBox>, PortError> {
        port.boxes_of_quarter(parent).await
    }

    async fn replace(port: &dyn GeoDataPort, parent: &Quarter) -> Result<(), PortError> {
        port.replace_quarter(parent).await
    }

    fn child_label(child: &BallotBox) -> String {
        format!(
            "{}/{}/{} box {}",
            child.city, child.district, child.quarter, child.number
        )
    }
}

#[async_trait]
impl Level for DistrictLevel {
    const KIND: LevelKind = LevelKind::District;

    type Parent = District;
    type Child = Quarter;

    async fn parents(port: &dyn GeoDataPort) -> Result<Vec<District>, PortError> {
        port.districts().await
    }

    async fn children(
        port: &dyn GeoDataPort,
        parent: &District,
    ) -> Result<Vec<Quarter>, PortError> {
        port.quarters_of_district(parent).await
    }

    async fn replace(port: &dyn GeoDataPort, parent: &District) -> Result<(), PortError> {
        port.replace_district(parent).await
    }

    fn child_label(child: &Quarter) -> String {
        child.label()
    }
}

#[async_trait]
impl Level for ConstituencyLevel {
    const KIND: LevelKind = LevelKind::Constituency;

    type Parent = Constituency;
    type Child = District;

    async fn parents(port: &dyn GeoDataPort) -> Result<Vec<Constituency>, PortError> {
        port.constituencies().await
    }

    async fn children(
        port: &dyn GeoDataPort,
        parent: &Constituency,
    ) -> Result<Vec<District>, PortError> {
        port.districts_of_constituency(parent).await
    }

    async fn replace(port: &dyn GeoDataPort, parent: &Constituency) -> Result<(), PortError> {
        port.replace_constituency(parent).await
    }

    fn child_label(child: &District) -> String {
        child.label()
    }
}

#[async_trait]
impl Level for CityLevel {
    const KIND: LevelKind = LevelKind::City;

    type Parent = City;
    type Child = Constituency;

    async fn parents(port: &dyn GeoDataPort) -> Result<Vec<City>, PortError> {
        port.cities().await
    }

    async fn children(
        port: &dyn GeoDataPort,
        parent: &City,
    ) -> Result<Vec<Constituency>, PortError> {
        port.constituencies_of_city(parent).await
    }

    async fn replace(port: &dyn GeoDataPort, parent: &City) -> Result<(), PortError> {
        port.replace_city(parent).await
    }

    fn child_label(child: &Constituency) -> String {
        child.label()
    }
}
