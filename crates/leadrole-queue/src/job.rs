//! Queue message payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use leadrole_models::JobId;

/// One unit of queued work: run the pipeline for this job id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJob {
    pub job_id: JobId,
    pub enqueued_at: DateTime<Utc>,
}

impl RunJob {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip() {
        let run = RunJob::new(JobId::from_string("job-1"));
        let json = serde_json::to_string(&run).unwrap();
        let back: RunJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, run);
        assert_eq!(back.job_id.as_str(), "job-1");
    }
}
