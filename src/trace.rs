//! Diagnostic trace URLs for submitted jobs.

use serde_json::json;

use crate::error::Result;
use crate::params::ConnectParams;
use crate::remote::{JobControl, JobId};

const POLICY_ACTION: &str = "odps:Read";

/// Builds the web-console link that shows a job's execution details.
#[derive(Debug, Clone)]
pub struct TraceUrlBuilder {
    host: String,
    endpoint: String,
    valid_hours: u32,
}

impl TraceUrlBuilder {
    pub fn new(host: impl Into<String>, endpoint: impl Into<String>, valid_hours: u32) -> Self {
        Self {
            host: host.into(),
            endpoint: endpoint.into(),
            valid_hours,
        }
    }

    pub fn from_params(params: &ConnectParams) -> Self {
        Self::new(
            params.trace_host.clone(),
            params.endpoint.clone(),
            params.trace_valid_hours,
        )
    }

    /// Read-only access policy for one job, in the service's policy format.
    pub fn policy(&self, project: &str, job: &JobId) -> String {
        json!({
            "expires_in_hours": self.valid_hours,
            "policy": {
                "Statement": [{
                    "Action": [POLICY_ACTION],
                    "Effect": "Allow",
                    "Resource": format!("acs:odps:*:projects/{}/instances/{}", project, job),
                }],
                "Version": "1",
            },
        })
        .to_string()
    }

    /// Generate the trace URL, asking the service to sign the policy.
    ///
    /// Returns an empty string without contacting the service when no host
    /// is configured.
    pub async fn generate<C: JobControl>(
        &self,
        control: &C,
        project: &str,
        job: &JobId,
    ) -> Result<String> {
        if self.host.is_empty() {
            return Ok(String::new());
        }
        let token = control
            .authorization_token(&self.policy(project, job))
            .await?;
        Ok(format!(
            "{}/logview/?h={}&p={}&i={}&token={}",
            self.host.trim_end_matches('/'),
            self.endpoint,
            project,
            job,
            token
        ))
    }
}
