//! Processing-service collaborator: in-flight job queries and submission.

use crate::types::{CandidatePair, JobHandle, PairError, PairResult};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Job statuses that mean "not yet finished".
///
/// The job store indexes by a single status value, so the deduplicator
/// queries each status separately and unions the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
        }
    }
}

/// An in-flight job record, reduced to the fields the deduplicator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub reference: Vec<String>,
    pub secondary: Vec<String>,
    pub job_name: String,
}

/// Abstract job-store + submission contract.
pub trait JobApi {
    /// Jobs of one status, for one user and job name, submitted at or after
    /// `min_time`. Pagination is drained before returning.
    fn find_jobs(
        &self,
        job_type: &str,
        user: &str,
        name: &str,
        min_time: DateTime<Utc>,
        status: JobStatus,
    ) -> PairResult<Vec<JobRecord>>;

    /// Submit one chunk of candidate pairs; returns a handle per accepted job.
    fn submit(&self, pairs: &[CandidatePair], job_type: &str) -> PairResult<Vec<JobHandle>>;
}

/// Blocking HTTP client for the HyP3-style processing API.
pub struct Hyp3Client {
    api_url: String,
    http: reqwest::blocking::Client,
}

impl Hyp3Client {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            http: reqwest::blocking::Client::new(),
        }
    }
}

impl JobApi for Hyp3Client {
    fn find_jobs(
        &self,
        job_type: &str,
        user: &str,
        name: &str,
        min_time: DateTime<Utc>,
        status: JobStatus,
    ) -> PairResult<Vec<JobRecord>> {
        let mut records = Vec::new();
        let mut next = Some(format!(
            "{}/jobs?job_type={}&user_id={}&name={}&start={}&status_code={}",
            self.api_url,
            job_type,
            user,
            name,
            min_time.to_rfc3339(),
            status.as_str(),
        ));

        while let Some(url) = next.take() {
            let page: Value = self
                .http
                .get(&url)
                .send()
                .map_err(|e| PairError::StoreUnavailable(format!("job store query failed: {}", e)))?
                .error_for_status()
                .map_err(|e| PairError::StoreUnavailable(format!("job store query failed: {}", e)))?
                .json()?;

            for job in page["jobs"].as_array().into_iter().flatten() {
                if let Some(record) = job_record_from_json(job) {
                    records.push(record);
                }
            }

            next = page["next"].as_str().map(String::from);
        }

        Ok(records)
    }

    fn submit(&self, pairs: &[CandidatePair], job_type: &str) -> PairResult<Vec<JobHandle>> {
        let jobs: Vec<Value> = pairs
            .iter()
            .map(|pair| {
                serde_json::json!({
                    "job_type": job_type,
                    "name": pair.job_name,
                    "job_parameters": {
                        "reference": pair.reference,
                        "secondary": pair.secondary,
                    },
                })
            })
            .collect();

        let response: Value = self
            .http
            .post(format!("{}/jobs", self.api_url))
            .json(&serde_json::json!({ "jobs": jobs }))
            .send()
            .map_err(|e| PairError::StoreUnavailable(format!("job submission failed: {}", e)))?
            .error_for_status()
            .map_err(|e| PairError::StoreUnavailable(format!("job submission failed: {}", e)))?
            .json()?;

        let handles = response["jobs"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|job| JobHandle {
                job_id: job["job_id"].as_str().unwrap_or_default().to_string(),
                job_name: job["name"].as_str().unwrap_or_default().to_string(),
            })
            .collect();

        Ok(handles)
    }
}

/// Parse one job store record.
///
/// Frame jobs carry explicit `reference`/`secondary` granule lists; scene
/// jobs carry a two-element `granules` list ordered reference-first.
fn job_record_from_json(job: &Value) -> Option<JobRecord> {
    let params = &job["job_parameters"];
    let job_name = job["name"].as_str().unwrap_or_default().to_string();

    let string_list = |value: &Value| -> Option<Vec<String>> {
        value
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
    };

    if let (Some(reference), Some(secondary)) = (
        string_list(&params["reference"]),
        string_list(&params["secondary"]),
    ) {
        return Some(JobRecord {
            reference,
            secondary,
            job_name,
        });
    }

    let granules = string_list(&params["granules"])?;
    if granules.len() != 2 {
        return None;
    }
    Some(JobRecord {
        reference: vec![granules[0].clone()],
        secondary: vec![granules[1].clone()],
        job_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_record_from_granule_pair() {
        let job: Value = serde_json::from_str(
            r#"{
                "name": "LC08_L1TP_138041_20240128_20240207_02_T1",
                "job_parameters": {
                    "granules": [
                        "LC08_L1TP_138041_20240128_20240207_02_T1",
                        "LC09_L1TP_138041_20240120_20240120_02_T1"
                    ]
                }
            }"#,
        )
        .unwrap();

        let record = job_record_from_json(&job).unwrap();
        assert_eq!(record.reference.len(), 1);
        assert_eq!(
            record.secondary,
            vec!["LC09_L1TP_138041_20240120_20240120_02_T1".to_string()]
        );
    }

    #[test]
    fn test_job_record_from_frame_lists() {
        let job: Value = serde_json::from_str(
            r#"{
                "name": "OPERA_30966_2025-10-03T15:49:00+00:00",
                "job_parameters": {
                    "reference": ["S1_A-BURST", "S1_B-BURST"],
                    "secondary": ["S1_C-BURST", "S1_D-BURST"]
                }
            }"#,
        )
        .unwrap();

        let record = job_record_from_json(&job).unwrap();
        assert_eq!(record.reference.len(), 2);
        assert_eq!(record.secondary.len(), 2);
    }

    #[test]
    fn test_malformed_job_record_is_skipped() {
        let job: Value =
            serde_json::from_str(r#"{"name": "x", "job_parameters": {"granules": ["only-one"]}}"#)
                .unwrap();
        assert!(job_record_from_json(&job).is_none());
    }
}
