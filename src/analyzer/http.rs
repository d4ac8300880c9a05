use super::{Analyzer, AnalyzerError, Verdict};
use crate::config::AnalyzerConfig;
use crate::error::Error;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Analyzer reached through its JSON gateway over HTTP(S).
pub struct HttpAnalyzer {
    client: Client,
    base_url: String,
    registration: Registration,
}

#[derive(Debug, Clone, Serialize)]
struct Registration {
    product_name: String,
    hostname: String,
    source_id: String,
    source_name: String,
    client_uuid: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Fingerprints {
    sha1: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BriefReports {
    reports: Vec<Verdict>,
}

impl HttpAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self, Error> {
        let base_url = config.url()?.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("x-api-key", config.api_key.as_str()),
            ("x-client-uuid", config.client_uuid.as_str()),
            ("x-product-name", config.product_name.as_str()),
            ("x-source-id", config.source_id.as_str()),
            ("x-source-name", config.source_name.as_str()),
            ("x-hostname", config.hostname.as_str()),
        ] {
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::InvalidConfig(format!("analyzer header {}: {}", name, e))
            })?;
            headers.insert(HeaderName::from_static(name), value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.ignore_tls_error)
            .default_headers(headers)
            .build()
            .map_err(AnalyzerError::from)?;

        Ok(Self {
            client,
            base_url,
            registration: Registration {
                product_name: config.product_name.clone(),
                hostname: config.hostname.clone(),
                source_id: config.source_id.clone(),
                source_name: config.source_name.clone(),
                client_uuid: config.client_uuid.clone(),
            },
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn post_json<T, R>(&self, path: &str, body: &T) -> Result<R, AnalyzerError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.client.post(self.endpoint(path)).json(body).send()?;
        let response = ensure_success(response)?;
        response
            .json::<R>()
            .map_err(|e| AnalyzerError::Decode(format!("{}: {}", path, e)))
    }
}

fn ensure_success(response: Response) -> Result<Response, AnalyzerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(AnalyzerError::Status {
        code: status.as_u16(),
        body: response.text().unwrap_or_default(),
    })
}

impl Analyzer for HttpAnalyzer {
    fn register(&self) -> Result<(), AnalyzerError> {
        let response = self
            .client
            .post(self.endpoint("register"))
            .json(&self.registration)
            .send()?;
        if response.status() == StatusCode::CONFLICT {
            return Err(AnalyzerError::AlreadyRegistered);
        }
        ensure_success(response)?;
        Ok(())
    }

    fn check_duplicate(&self, fingerprints: &[String]) -> Result<Vec<String>, AnalyzerError> {
        let request = Fingerprints {
            sha1: fingerprints.to_vec(),
        };
        let known: Fingerprints = self.post_json("samples/duplicates", &request)?;
        Ok(known.sha1)
    }

    fn upload(&self, path: &Path, fingerprint: &str) -> Result<(), AnalyzerError> {
        debug!("Uploading {} as {}", path.display(), fingerprint);
        let form = multipart::Form::new()
            .text("sha1", fingerprint.to_string())
            .file("file", path)?;
        let response = self
            .client
            .post(self.endpoint("samples"))
            .multipart(form)
            .send()?;
        ensure_success(response)?;
        Ok(())
    }

    fn get_verdict(&self, fingerprints: &[String]) -> Result<Vec<Verdict>, AnalyzerError> {
        let request = Fingerprints {
            sha1: fingerprints.to_vec(),
        };
        let brief: BriefReports = self.post_json("reports/brief", &request)?;
        Ok(brief.reports)
    }
}
