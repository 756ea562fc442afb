//! Single-request execution.
use tokio::time::Instant;

use crate::{
    report::ResultRecord,
    request::{RequestIssuer, RequestParameters},
};

/// Performs one call through `issuer` and normalizes the outcome.
///
/// Never fails: any error raised by the issuer is captured into a failed
/// [`ResultRecord`]. The elapsed time is the wall-clock time around the call.
pub async fn execute<I>(issuer: &I, params: &RequestParameters) -> ResultRecord
where
    I: RequestIssuer + ?Sized,
{
    let t = Instant::now();
    let res = issuer.issue(params).await;
    let elapsed = t.elapsed();

    match res {
        Ok(output) => ResultRecord::success(output.content, output.reasoning, elapsed),
        Err(e) => {
            tracing::warn!(?elapsed, "request failed: {e:#}");
            ResultRecord::failure(elapsed, format!("{e:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::{Result, bail};
    use async_trait::async_trait;

    use super::*;
    use crate::request::IssuerOutput;

    struct Echo;

    #[async_trait]
    impl RequestIssuer for Echo {
        async fn issue(&self, params: &RequestParameters) -> Result<IssuerOutput> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(IssuerOutput { content: params.prompt.clone(), reasoning: "thinking".into() })
        }
    }

    struct Broken;

    #[async_trait]
    impl RequestIssuer for Broken {
        async fn issue(&self, _: &RequestParameters) -> Result<IssuerOutput> {
            bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn success_is_recorded() {
        let record = execute(&Echo, &RequestParameters::new("ping")).await;
        assert!(record.is_success());
        assert_eq!(record.response, "ping");
        assert_eq!(record.reasoning, "thinking");
        assert!(record.elapsed >= Duration::from_millis(20));
        assert_eq!(record.error, None);
    }

    #[tokio::test]
    async fn failure_is_captured() {
        let record = execute(&Broken, &RequestParameters::new("ping")).await;
        assert!(!record.is_success());
        assert!(record.response.is_empty());
        assert!(record.reasoning.is_empty());
        assert_eq!(record.error.as_deref(), Some("connection refused"));
    }

    #[tokio::test]
    async fn works_through_trait_objects() {
        let issuer: Box<dyn RequestIssuer> = Box::new(Echo);
        let record = execute(issuer.as_ref(), &RequestParameters::new("dyn")).await;
        assert_eq!(record.response, "dyn");
    }
}
