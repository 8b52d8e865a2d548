//! Data service client for the election results REST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use rollup_core::{
    model::{BallotBox, City, Constituency, District, Quarter},
    ports::{GeoDataPort, PortError},
};

/// Where the results service listens when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:84/v1/";

/// User agent the updater announces itself with.
pub const DEFAULT_USER_AGENT: &str = "updater-v1";

/// [`GeoDataPort`] speaking JSON over HTTP.
///
/// Requests carry no credentials; the write routes of the results service
/// are currently open.
pub struct HttpGeoDataPort {
    client: Client,
    base: Url,
}

impl HttpGeoDataPort {
    /// Create a port bound to the given HTTP client and base URL, e.g.
    /// `http://localhost:84/v1/`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::InvalidUrl`] when the base URL does not parse or
    /// cannot carry path segments.
    pub fn new(client: Client, base_url: &str) -> Result<Self, PortError> {
        let base = Url::parse(base_url)
            .map_err(|err| PortError::InvalidUrl(format!("{base_url}: {err}")))?;
        if base.cannot_be_a_base() {
            return Err(PortError::InvalidUrl(base_url.to_owned()));
        }
        Ok(Self { client, base })
    }

    /// Build `base/segment/.../` with every segment percent-encoded. The
    /// trailing slash matches the routes of the results service.
    fn url(&self, segments: &[&str]) -> Result<Url, PortError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| PortError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    async fn list<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>, PortError> {
        let url = self.url(segments)?;
        let req = self.client.get(url.clone());
        match fetch_json(req, &url).await {
            Err(PortError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                debug!(%url, "nothing found");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn put<T: Serialize + Sync>(&self, segments: &[&str], body: &T) -> Result<(), PortError> {
        let url = self.url(segments)?;
        let resp = self
            .client
            .put(url.clone())
            .json(body)
            .send()
            .await
            .map_err(PortError::from)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PortError::Status {
                status,
                url: url.to_string(),
            });
        }
        debug!(%url, %status, "replaced");
        Ok(())
    }
}

#[async_trait]
impl GeoDataPort for HttpGeoDataPort {
    async fn cities(&self) -> Result<Vec<City>, PortError> {
        self.list(&["cities"]).await
    }

    async fn constituencies(&self) -> Result<Vec<Constituency>, PortError> {
        self.list(&["constituencies"]).await
    }

    async fn districts(&self) -> Result<Vec<District>, PortError> {
        self.list(&["districts"]).await
    }

    async fn quarters(&self) -> Result<Vec<Quarter>, PortError> {
        self.list(&["quarters"]).await
    }

    async fn constituencies_of_city(&self, city: &City) -> Result<Vec<Constituency>, PortError> {
        self.list(&["constituencies", city.name.as_str()]).await
    }

    async fn districts_of_constituency(
        &self,
        constituency: &Constituency,
    ) -> Result<Vec<District>, PortError> {
        self.list(&["districts", constituency.city.as_str(), constituency.name.as_str()])
            .await
    }

    async fn quarters_of_district(&self, district: &District) -> Result<Vec<Quarter>, PortError> {
        self.list(&["quarters", district.city.as_str(), district.name.as_str()])
            .await
    }

    async fn boxes_of_quarter(&self, quarter: &Quarter) -> Result<Vec<BallotBox>, PortError> {
        self.list(&[
            "boxes",
            quarter.city.as_str(),
            quarter.district.as_str(),
            quarter.name.as_str(),
        ])
        .await
    }

    async fn replace_city(&self, city: &City) -> Result<(), PortError> {
        self.put(&["city", city.name.as_str()], city).await
    }

    // Constituency names repeat across cities, so the service addresses
    // them by record id.
    async fn replace_constituency(&self, constituency: &Constituency) -> Result<(), PortError> {
        self.put(&["constituency", constituency.id.0.as_str()], constituency)
            .await
    }

    async fn replace_district(&self, district: &District) -> Result<(), PortError> {
        self.put(&["district", district.city.as_str(), district.name.as_str()], district)
            .await
    }

    async fn replace_quarter(&self, quarter: &Quarter) -> Result<(), PortError> {
        self.put(
            &[
                "quarter",
                quarter.city.as_str(),
                quarter.district.as_str(),
                quarter.name.as_str(),
            ],
            quarter,
        )
        .await
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder, url: &Url) -> Result<T, PortError> {
    let resp = req.send().await.map_err(PortError::from)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(PortError::Status {
            status,
            url: url.to_string(),
        });
    }
    resp.json().await.map_err(|source| PortError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_at(base: &str) -> HttpGeoDataPort {
        HttpGeoDataPort::new(Client::new(), base).expect("valid base")
    }

    #[test]
    fn urls_end_with_a_slash_and_encode_names() {
        let port = port_at("http://localhost:84/v1/");
        let url = port
            .url(&["boxes", "Ankara", "Çankaya", "Yeni Mahalle"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:84/v1/boxes/Ankara/%C3%87ankaya/Yeni%20Mahalle/",
            "encoded path"
        );
    }

    #[test]
    fn base_without_trailing_slash_is_accepted() {
        let port = port_at("http://results.internal/v1");
        let url = port.url(&["cities"]).expect("url");
        assert_eq!(url.as_str(), "http://results.internal/v1/cities/", "joined path");
    }

    #[test]
    fn slash_inside_a_name_stays_one_segment() {
        let port = port_at("http://localhost:84/v1/");
        let url = port.url(&["constituencies", "a/b"]).expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:84/v1/constituencies/a%2Fb/",
            "slash escaped"
        );
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(
            matches!(
                HttpGeoDataPort::new(Client::new(), "not a url"),
                Err(PortError::InvalidUrl(_))
            ),
            "garbage base"
        );
        assert!(
            matches!(
                HttpGeoDataPort::new(Client::new(), "mailto:ops@example.org"),
                Err(PortError::InvalidUrl(_))
            ),
            "cannot-be-a-base url"
        );
    }
}
