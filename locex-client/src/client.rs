use crate::auth::{AuthContext, Credentials};
use crate::ClientError;
use locex_core::{
    AuthStatus, Experiment, ExperimentResult, NewExperiment, NewSample, Sample, SubmissionPayload,
    Validate,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("locex/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed access to the experiment backend.
///
/// Every request carries the session cookie set by [`ApiClient::login`].
/// Nothing is retried.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_owned()));
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .build()?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // --- auth ---

    /// Current session. A 401/403 means "not signed in", not an error.
    pub async fn auth_status(&self) -> Result<AuthContext, ClientError> {
        let url = self.endpoint(&["auth", "status"]);
        debug!(%url, "GET auth status");
        let resp = self.http.get(url).send().await?;
        if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(AuthContext::anonymous());
        }
        let status: AuthStatus = decode(check(resp, "auth status").await?).await?;
        Ok(status.into())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthContext, ClientError> {
        let url = self.endpoint(&["auth", "login"]);
        let resp = self
            .http
            .post(url)
            .json(&Credentials { username, password })
            .send()
            .await?;
        check(resp, "login").await?;
        info!(username, "Signed in");
        Ok(AuthContext::signed_in(username))
    }

    pub async fn logout(&self) -> Result<AuthContext, ClientError> {
        let url = self.endpoint(&["auth", "logout"]);
        check(self.http.post(url).send().await?, "logout").await?;
        info!("Signed out");
        Ok(AuthContext::anonymous())
    }

    // --- experiments ---

    pub async fn list_experiments(&self) -> Result<Vec<Experiment>, ClientError> {
        let experiments: Vec<Experiment> = self.get_json(&["experiments"], "experiments").await?;
        info!(count = experiments.len(), "Fetched experiments");
        Ok(experiments)
    }

    pub async fn experiment(&self, id: &str) -> Result<Experiment, ClientError> {
        self.get_json(&["experiments", id], "experiment").await
    }

    pub async fn create_experiment(&self, experiment: &NewExperiment) -> Result<(), ClientError> {
        experiment.validate()?;
        let url = self.endpoint(&["experiments"]);
        let resp = self.http.post(url).json(experiment).send().await?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(ClientError::Conflict {
                resource: "an experiment",
            });
        }
        check(resp, "experiment").await?;
        info!(name = %experiment.name, samples = experiment.sample_ids.len(), "Experiment created");
        Ok(())
    }

    pub async fn delete_experiment(&self, id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["experiments", id]);
        check(self.http.delete(url).send().await?, "experiment").await?;
        info!(id, "Experiment deleted");
        Ok(())
    }

    // --- results ---

    pub async fn submit_results(
        &self,
        experiment_id: &str,
        payload: &SubmissionPayload,
    ) -> Result<(), ClientError> {
        payload.validate()?;
        let url = self.endpoint(&["experiments", "results", experiment_id]);
        let resp = self.http.post(url).json(payload).send().await?;
        check(resp, "experiment").await?;
        info!(
            experiment = experiment_id,
            results = payload.sample_results.len(),
            training = payload.training,
            "Results submitted"
        );
        Ok(())
    }

    pub async fn experiment_results(&self, id: &str) -> Result<Vec<ExperimentResult>, ClientError> {
        self.get_json(&["experiments", "results", id], "experiment results")
            .await
    }

    // --- samples ---

    pub async fn list_samples(&self) -> Result<Vec<Sample>, ClientError> {
        let samples: Vec<Sample> = self.get_json(&["audio", "all"], "samples").await?;
        info!(count = samples.len(), "Fetched samples");
        Ok(samples)
    }

    /// Uploads metadata and audio as two unnamed multipart parts, JSON first.
    pub async fn upload_sample(
        &self,
        sample: &NewSample,
        audio: Vec<u8>,
        filename: &str,
    ) -> Result<(), ClientError> {
        sample.validate()?;
        let size = audio.len();
        let metadata = Part::text(serde_json::to_string(sample)?).mime_str("application/json")?;
        let file = Part::bytes(audio).file_name(filename.to_owned());
        let form = Form::new().part("", metadata).part("", file);

        let url = self.endpoint(&["audio"]);
        let resp = self.http.post(url).multipart(form).send().await?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(ClientError::Conflict { resource: "a sample" });
        }
        check(resp, "sample").await?;
        info!(name = %sample.name, bytes = size, "Sample uploaded");
        Ok(())
    }

    pub async fn delete_sample(&self, id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["audio", id]);
        check(self.http.delete(url).send().await?, "sample").await?;
        info!(id, "Sample deleted");
        Ok(())
    }

    /// Raw audio bytes of one sample.
    pub async fn sample_audio(&self, id: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.endpoint(&["audio", id]);
        let resp = check(self.http.get(url).send().await?, "sample audio").await?;
        let bytes = resp.bytes().await?;
        debug!(id, bytes = bytes.len(), "Fetched sample audio");
        Ok(bytes.to_vec())
    }

    async fn get_json<T>(&self, segments: &[&str], what: &str) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Validate,
    {
        let url = self.endpoint(segments);
        debug!(%url, "GET");
        let resp = self.http.get(url).send().await?;
        decode(check(resp, what).await?).await
    }
}

/// Maps non-success statuses onto the error taxonomy.
async fn check(resp: Response, what: &str) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Unauthorized),
        StatusCode::NOT_FOUND => Err(ClientError::NotFound(what.to_owned())),
        StatusCode::CONFLICT => Err(ClientError::Conflict { resource: "a record" }),
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(ClientError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

async fn decode<T>(resp: Response) -> Result<T, ClientError>
where
    T: DeserializeOwned + Validate,
{
    let bytes = resp.bytes().await?;
    let value: T = serde_json::from_slice(&bytes)?;
    value.validate()?;
    Ok(value)
}
