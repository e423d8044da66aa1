use anyhow::{Context, Result};
use geo::Polygon;
use log::{info, warn};
use reqwest::blocking::{multipart, Client, Response};
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

use crate::collect::egi::order_response::parse_order_id;
use crate::collect::global_variables::{
    DEFAULT_SHORT_NAME, DEFAULT_VERSION, EGI_URL, GEOG_EPSG, PAGE_SIZE, SUBAGENT_ID,
};
use crate::commons::basic_functions::TimeRange;
use crate::error::Is2Error;
use crate::geometric::polygon::{format_polygon, simplify_for_url, SimplifyOptions};
use crate::geometric::shapefile::{
    first_geometry_from_zipped_shapefile, geometry_to_zipped_shapefile, ShapefileOptions,
    VectorDriver,
};

/// Query parameters of one order request
pub type OrderParams = BTreeMap<&'static str, String>;

/// How a subset order is submitted to EGI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Multipart POST of a zipped shapefile, asynchronous processing
    ShapefileUpload,
    /// GET with the polygon in the query string, asynchronous processing
    AsyncUrl,
    /// GET with the polygon in the query string, data returned in the response
    SyncUrl,
}

impl SubmissionMode {
    fn call_name(&self) -> &'static str {
        match self {
            SubmissionMode::ShapefileUpload => "EGI shapefile upload order",
            SubmissionMode::AsyncUrl => "EGI asynchronous order",
            SubmissionMode::SyncUrl => "EGI synchronous request",
        }
    }
}

/// Result of a submitted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Id of an asynchronous order, to be polled later
    OrderId(String),
    /// Raw subsetted data of a synchronous request
    Payload(Vec<u8>),
}

impl OrderOutcome {
    pub fn order_id(&self) -> Option<&str> {
        match self {
            OrderOutcome::OrderId(id) => Some(id),
            OrderOutcome::Payload(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            OrderOutcome::OrderId(_) => None,
            OrderOutcome::Payload(bytes) => Some(bytes),
        }
    }
}

/// Settings shared by every order of an [`EgiOrder`]
#[derive(Debug, Clone)]
pub struct OrderConfig {
    pub endpoint: String,
    pub short_name: String,
    pub version: String,
    /// Requester email, not sent with synchronous requests
    pub email: Option<String>,
    pub time_range: Option<TimeRange>,
    pub simplify: SimplifyOptions,
    /// Uploads are always ESRI Shapefile in EPSG:4326, only `feature_id` is taken from here
    pub shapefile: ShapefileOptions,
}

impl Default for OrderConfig {
    fn default() -> Self {
        OrderConfig {
            endpoint: EGI_URL.to_string(),
            short_name: DEFAULT_SHORT_NAME.to_string(),
            version: DEFAULT_VERSION.to_string(),
            email: None,
            time_range: None,
            simplify: SimplifyOptions::default(),
            shapefile: ShapefileOptions::default(),
        }
    }
}

/// Spatial/temporal subset orders against the NSIDC EGI API
pub struct EgiOrder {
    pub config: OrderConfig,
    client: Client,
}

impl EgiOrder {
    pub fn new(config: OrderConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(EgiOrder { config, client })
    }

    /// Product short name and version, e.g. ("ATL08", "001")
    pub fn set_product(&mut self, short_name: &str, version: &str) {
        self.config.short_name = short_name.to_string();
        self.config.version = version.to_string();
    }

    pub fn set_time_range(&mut self, time_range: Option<TimeRange>) {
        self.config.time_range = time_range;
    }

    pub fn set_email(&mut self, email: Option<String>) {
        self.config.email = email;
    }

    /// Query parameters for `mode`, given the already formatted polygon
    pub fn build_params(&self, mode: SubmissionMode, polygon: &str) -> OrderParams {
        let config = &self.config;
        let mut params = OrderParams::new();
        params.insert("short_name", config.short_name.clone());
        params.insert("version", config.version.clone());
        params.insert("polygon", polygon.to_string());
        if let Some(time_range) = &config.time_range {
            params.insert("time", time_range.to_param());
        }

        match mode {
            SubmissionMode::ShapefileUpload => {
                params.insert("page_size", PAGE_SIZE.to_string());
                params.insert("request_mode", "async".to_string());
            }
            SubmissionMode::AsyncUrl => {
                // EGI reads the subset shape from `boundingshape` and filters granules
                // on `polygon`, both are sent
                params.insert("boundingshape", polygon.to_string());
                params.insert("subagent_id", SUBAGENT_ID.to_string());
            }
            SubmissionMode::SyncUrl => {
                params.insert("boundingshape", polygon.to_string());
                params.insert("request_mode", "sync".to_string());
                params.insert("agent", "NO".to_string());
            }
        }

        if mode != SubmissionMode::SyncUrl {
            if let Some(email) = &config.email {
                params.insert("email", email.clone());
            }
        }

        params
    }

    /// Submit a subset order for `geometry`
    ///
    /// Shapefile uploads and asynchronous URL orders return the order id,
    /// synchronous requests return the response body.
    pub fn submit(&self, geometry: &Polygon<f64>, mode: SubmissionMode) -> Result<OrderOutcome> {
        match mode {
            SubmissionMode::ShapefileUpload => {
                let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
                let zip_path = temp_dir.path().join("subset.zip");
                // EGI only accepts ESRI shapefiles and the geometry is lon/lat
                let options = ShapefileOptions {
                    driver: VectorDriver::EsriShapefile,
                    epsg: GEOG_EPSG,
                    ..self.config.shapefile.clone()
                };
                geometry_to_zipped_shapefile(geometry, &zip_path, &options)?;
                let order_id = self.submit_zipped_shapefile(&zip_path)?;
                Ok(OrderOutcome::OrderId(order_id))
            }
            SubmissionMode::AsyncUrl | SubmissionMode::SyncUrl => {
                let simplified = simplify_for_url(geometry, &self.config.simplify)?;
                let polygon = format_polygon(&simplified)?;
                let params = self.build_params(mode, &polygon);

                info!(
                    "{} for {}: {}",
                    mode.call_name(),
                    self.config.short_name,
                    self.config.endpoint
                );
                let response = self
                    .client
                    .get(&self.config.endpoint)
                    .query(&params)
                    .send()
                    .context(format!("Failed to send {}", mode.call_name()))?;
                let content = ensure_success(mode.call_name(), response)?
                    .bytes()
                    .context("Failed to read response body")?;

                if mode == SubmissionMode::SyncUrl {
                    Ok(OrderOutcome::Payload(content.to_vec()))
                } else {
                    Ok(OrderOutcome::OrderId(parse_order_id(&content)?))
                }
            }
        }
    }

    /// Order a subset using the first geometry of a zipped shapefile
    ///
    /// The archive is uploaded as-is; the `polygon` granule filter is derived
    /// from its first feature, simplified to fit in the query string.
    pub fn submit_zipped_shapefile(&self, zipped_shapefile_path: &Path) -> Result<String> {
        let mode = SubmissionMode::ShapefileUpload;
        let geometry = first_geometry_from_zipped_shapefile(zipped_shapefile_path)?;
        let simplified = simplify_for_url(&geometry, &self.config.simplify)?;
        let polygon = format_polygon(&simplified)?;
        let params = self.build_params(mode, &polygon);

        let form = multipart::Form::new()
            .file("shapefile", zipped_shapefile_path)
            .context(format!("Failed to attach {:?}", zipped_shapefile_path))?;

        info!(
            "{} for {}: {}",
            mode.call_name(),
            self.config.short_name,
            self.config.endpoint
        );
        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&params)
            .multipart(form)
            .send()
            .context(format!("Failed to send {}", mode.call_name()))?;
        let content = ensure_success(mode.call_name(), response)?
            .bytes()
            .context("Failed to read response body")?;

        parse_order_id(&content)
    }
}

fn ensure_success(call: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = match response.text() {
            Ok(body) => body,
            Err(e) => {
                warn!("{} failed with {} and an unreadable body: {}", call, status, e);
                String::new()
            }
        };
        return Err(Is2Error::Http {
            call,
            status: status.as_u16(),
            body,
        }
        .into());
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geo::polygon;
    use reqwest::Url;
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    const ORDER_XML: &str = "<eesi:agentResponse xmlns:eesi=\"http://eosdis.nasa.gov/esi/rsp\">\
        <order><orderId>5000000123456</orderId></order></eesi:agentResponse>";

    /// Captured request of the one-shot responder
    struct Captured {
        method: String,
        query: HashMap<String, String>,
        body: Vec<u8>,
    }

    /// Accept one connection on a local port, answer with `status` and `body`
    fn serve_once(status: u16, body: &'static [u8]) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap().to_string();
            let target = parts.next().unwrap().to_string();

            let mut content_length = None;
            let mut chunked = false;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    content_length = Some(v.trim().parse::<usize>().unwrap());
                }
                if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
                    chunked = true;
                }
            }

            let mut request_body = Vec::new();
            if let Some(len) = content_length {
                request_body.resize(len, 0);
                reader.read_exact(&mut request_body).unwrap();
            } else if chunked {
                loop {
                    let mut size_line = String::new();
                    reader.read_line(&mut size_line).unwrap();
                    let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
                    let mut chunk = vec![0; size + 2];
                    reader.read_exact(&mut chunk).unwrap();
                    if size == 0 {
                        break;
                    }
                    request_body.extend_from_slice(&chunk[..size]);
                }
            }

            let mut stream = stream;
            let head = format!(
                "HTTP/1.1 {} Test\r\n\
                 Content-Type: application/xml\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
            stream.flush().unwrap();

            let url = Url::parse(&format!("http://localhost{}", target)).unwrap();
            Captured {
                method,
                query: url.query_pairs().into_owned().collect(),
                body: request_body,
            }
        });
        (format!("http://{}/egi/request", addr), handle)
    }

    fn order_for(endpoint: String) -> EgiOrder {
        EgiOrder::new(OrderConfig {
            endpoint,
            email: Some("someone@example.org".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    fn region() -> Polygon<f64> {
        polygon![
            (x: -84.05, y: 10.40),
            (x: -83.98, y: 10.40),
            (x: -83.98, y: 10.45),
            (x: -84.05, y: 10.45),
            (x: -84.05, y: 10.40),
        ]
    }

    fn keys(params: &OrderParams) -> Vec<&'static str> {
        params.keys().copied().collect()
    }

    #[test]
    fn test_default_config() {
        let config = OrderConfig::default();
        assert_eq!(config.endpoint, "https://n5eil02u.ecs.nsidc.org/egi/request");
        assert_eq!(config.short_name, "ATL06");
        assert_eq!(config.version, "001");
        assert_eq!(config.simplify.limit, 1000);
    }

    #[test]
    fn test_params_shapefile_upload() {
        let mut order = order_for(EGI_URL.to_string());
        order.set_time_range(Some(TimeRange::new(
            Utc.with_ymd_and_hms(2019, 3, 1, 0, 0, 0).unwrap(),
            None,
        )));
        let params = order.build_params(SubmissionMode::ShapefileUpload, "1,2,3,4");
        assert_eq!(
            keys(&params),
            vec!["email", "page_size", "polygon", "request_mode", "short_name", "time", "version"]
        );
        assert_eq!(params["page_size"], "2000");
        assert_eq!(params["request_mode"], "async");
        assert_eq!(params["time"], "2019-03-01T00:00:00Z,2019-03-02T00:00:00Z");
    }

    #[test]
    fn test_params_async_url_keeps_both_shapes() {
        let order = order_for(EGI_URL.to_string());
        let params = order.build_params(SubmissionMode::AsyncUrl, "1,2,3,4");
        assert_eq!(
            keys(&params),
            vec!["boundingshape", "email", "polygon", "short_name", "subagent_id", "version"]
        );
        assert_eq!(params["boundingshape"], params["polygon"]);
        assert_eq!(params["subagent_id"], "ICESAT2");
    }

    #[test]
    fn test_params_sync_url_has_no_email() {
        let mut order = order_for(EGI_URL.to_string());
        order.set_product("ATL08", "002");
        let params = order.build_params(SubmissionMode::SyncUrl, "1,2,3,4");
        assert_eq!(
            keys(&params),
            vec!["agent", "boundingshape", "polygon", "request_mode", "short_name", "version"]
        );
        assert_eq!(params["agent"], "NO");
        assert_eq!(params["request_mode"], "sync");
        assert_eq!(params["short_name"], "ATL08");
        assert_eq!(params["version"], "002");
    }

    #[test]
    fn test_submit_async_url() {
        let (endpoint, server) = serve_once(200, ORDER_XML.as_bytes());
        let order = order_for(endpoint);

        let outcome = order.submit(&region(), SubmissionMode::AsyncUrl).unwrap();
        assert_eq!(outcome.order_id(), Some("5000000123456"));

        let captured = server.join().unwrap();
        assert_eq!(captured.method, "GET");
        let expected = format_polygon(&region()).unwrap();
        assert_eq!(captured.query["polygon"], expected);
        assert_eq!(captured.query["boundingshape"], expected);
        assert_eq!(captured.query["email"], "someone@example.org");
        assert!(!captured.query.contains_key("time"));
    }

    #[test]
    fn test_submit_sync_url_returns_payload() {
        let (endpoint, server) = serve_once(200, b"\x89HDF\r\n\x1a\nsubset");
        let order = order_for(endpoint);

        let outcome = order.submit(&region(), SubmissionMode::SyncUrl).unwrap();
        assert_eq!(outcome.payload(), Some(&b"\x89HDF\r\n\x1a\nsubset"[..]));
        assert_eq!(outcome.order_id(), None);

        let captured = server.join().unwrap();
        assert_eq!(captured.query["request_mode"], "sync");
        assert!(!captured.query.contains_key("email"));
    }

    fn assert_http_error(err: anyhow::Error, expected_call: &str) {
        match err.downcast_ref::<Is2Error>() {
            Some(Is2Error::Http { call, status, body }) => {
                assert_eq!(*call, expected_call);
                assert_eq!(*status, 503);
                assert!(body.contains("maintenance"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_submit_http_error() {
        let cases = [
            (SubmissionMode::AsyncUrl, "EGI asynchronous order", "GET"),
            (SubmissionMode::SyncUrl, "EGI synchronous request", "GET"),
            (SubmissionMode::ShapefileUpload, "EGI shapefile upload order", "POST"),
        ];
        for (mode, call, method) in cases {
            let (endpoint, server) = serve_once(503, b"<error>maintenance</error>");
            let order = order_for(endpoint);

            let err = order.submit(&region(), mode).unwrap_err();
            assert_eq!(server.join().unwrap().method, method);
            assert_http_error(err, call);
        }
    }

    #[test]
    fn test_submit_ambiguous_response() {
        let xml = b"<r><order><orderId>1</orderId></order><order><orderId>2</orderId></order></r>";
        let (endpoint, server) = serve_once(200, xml);
        let order = order_for(endpoint);

        let err = order.submit(&region(), SubmissionMode::AsyncUrl).unwrap_err();
        server.join().unwrap();
        assert!(matches!(
            err.downcast_ref::<Is2Error>(),
            Some(Is2Error::MalformedResponse { found: 2 })
        ));
    }

    #[test]
    fn test_submit_shapefile_upload() {
        let (endpoint, server) = serve_once(200, ORDER_XML.as_bytes());
        let order = order_for(endpoint);

        let outcome = order
            .submit(&region(), SubmissionMode::ShapefileUpload)
            .unwrap();
        assert_eq!(outcome, OrderOutcome::OrderId("5000000123456".to_string()));

        let captured = server.join().unwrap();
        assert_eq!(captured.method, "POST");
        assert_eq!(captured.query["page_size"], "2000");
        assert_eq!(captured.query["request_mode"], "async");
        assert_eq!(captured.query["polygon"], format_polygon(&region()).unwrap());
        let body = String::from_utf8_lossy(&captured.body);
        assert!(body.contains("name=\"shapefile\""));
        assert!(body.contains("filename=\"subset.zip\""));
    }

    #[test]
    fn test_shapefile_upload_ignores_other_drivers() {
        let (endpoint, server) = serve_once(200, ORDER_XML.as_bytes());
        let order = EgiOrder::new(OrderConfig {
            endpoint,
            shapefile: ShapefileOptions {
                driver: VectorDriver::Libkml,
                epsg: 3857,
                feature_id: 7,
            },
            ..Default::default()
        })
        .unwrap();

        let outcome = order
            .submit(&region(), SubmissionMode::ShapefileUpload)
            .unwrap();
        assert_eq!(outcome.order_id(), Some("5000000123456"));

        let captured = server.join().unwrap();
        // zip entry names are stored uncompressed in the archive headers
        let body = String::from_utf8_lossy(&captured.body);
        assert!(body.contains("tmp.shp"));
        assert!(!body.contains("tmp.kml"));
        assert_eq!(captured.query["polygon"], format_polygon(&region()).unwrap());
    }
}
