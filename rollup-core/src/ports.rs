//! Trait describing the results data service and its error type.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use reqwest::StatusCode;

use crate::model::{BallotBox, City, Constituency, District, Quarter};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to the data service.
pub enum PortError {
    /// Network layer failed (connection refused, timeout, ...).
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Service answered with an unexpected status.
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// Status returned by the service.
        status: StatusCode,
        /// Requested URL.
        url: String,
    },
    /// Response body did not match the expected shape.
    #[error("Malformed response from {url}: {source}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Underlying decoder failure.
        source: ReqwestError,
    },
    /// A request URL could not be built from the configured base.
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    /// Internal provider error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Read and replace operations the aggregator needs from the data service.
///
/// List operations answer with an empty list when the service has nothing
/// for the query; that is not an error.
pub trait GeoDataPort: Send + Sync {
    /// Every city.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn cities(&self) -> Result<Vec<City>, PortError>;

    /// Every constituency.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn constituencies(&self) -> Result<Vec<Constituency>, PortError>;

    /// Every district.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn districts(&self) -> Result<Vec<District>, PortError>;

    /// Every quarter.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn quarters(&self) -> Result<Vec<Quarter>, PortError>;

    /// Constituencies of one city.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn constituencies_of_city(&self, city: &City) -> Result<Vec<Constituency>, PortError>;

    /// Districts of one constituency.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn districts_of_constituency(
        &self,
        constituency: &Constituency,
    ) -> Result<Vec<District>, PortError>;

    /// Quarters of one district.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn quarters_of_district(&self, district: &District) -> Result<Vec<Quarter>, PortError>;

    /// Ballot boxes of one quarter.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails.
    async fn boxes_of_quarter(&self, quarter: &Quarter) -> Result<Vec<BallotBox>, PortError>;

    /// Overwrite a city record in full.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or is rejected.
    async fn replace_city(&self, city: &City) -> Result<(), PortError>;

    /// Overwrite a constituency record in full.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or is rejected.
    async fn replace_constituency(&self, constituency: &Constituency) -> Result<(), PortError>;

    /// Overwrite a district record in full.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or is rejected.
    async fn replace_district(&self, district: &District) -> Result<(), PortError>;

    /// Overwrite a quarter record in full.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the request fails or is rejected.
    async fn replace_quarter(&self, quarter: &Quarter) -> Result<(), PortError>;
}
