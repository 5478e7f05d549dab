//! LTI 1.1 Basic Outcomes client.
//!
//! Posts a `replaceResult` request to the outcome-service URL recorded at
//! launch. The request is signed with the launching consumer's secret using
//! an OAuth1 `Authorization` header that includes `oauth_body_hash`.
//!
//! Grade posting is a business operation, not a security event: every
//! failure is reported as `false` and logged, never raised.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use url::Url;

use crate::config::OutcomeConfig;
use crate::consumer::ConsumerRegistry;
use crate::launch::LaunchContext;
use crate::oauth1::{OAuthSigner, body_hash};
use crate::url_fix::UrlFixupTable;

const POX_NAMESPACE: &str = "http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0";

/// Client for the consumer's outcome service.
#[derive(Debug, Clone)]
pub struct OutcomeClient {
    http_client: reqwest::Client,
    registry: Arc<ConsumerRegistry>,
    url_fix: UrlFixupTable,
}

impl OutcomeClient {
    /// Creates a client with the configured request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in practice).
    #[must_use]
    pub fn new(
        registry: Arc<ConsumerRegistry>,
        url_fix: UrlFixupTable,
        config: &OutcomeConfig,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            registry,
            url_fix,
        }
    }

    /// Resolves the URL a grade for `context` would be posted to.
    #[must_use]
    pub fn target_url(&self, context: &LaunchContext) -> Option<String> {
        context
            .lis_outcome_service_url
            .as_deref()
            .map(|url| self.url_fix.apply(url))
    }

    /// Posts `grade` for the launch described by `context`.
    ///
    /// Returns `true` only when the outcome service answered with a 2xx
    /// status. A grade outside `0.0..=1.0`, a launch without outcome data, an
    /// unknown consumer, a transport error or a non-2xx status all yield
    /// `false`. The request is attempted once.
    pub async fn post_grade(&self, context: &LaunchContext, grade: f64) -> bool {
        if !grade.is_finite() || !(0.0..=1.0).contains(&grade) {
            tracing::warn!(grade, "Grade outside 0.0..=1.0, not posted");
            return false;
        }

        let Some(sourcedid) = context.lis_result_sourcedid.as_deref() else {
            tracing::warn!(consumer_key = %context.consumer_key, "Launch has no lis_result_sourcedid");
            return false;
        };

        let Some(target) = self.target_url(context) else {
            tracing::warn!(consumer_key = %context.consumer_key, "Launch has no lis_outcome_service_url");
            return false;
        };

        let url = match Url::parse(&target) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(url = %target, error = %e, "Invalid outcome service URL");
                return false;
            }
        };

        let consumer = match self.registry.lookup(&context.consumer_key) {
            Ok(consumer) => consumer.clone(),
            Err(e) => {
                tracing::warn!(detail = %e.detail(), "Cannot sign outcome request");
                return false;
            }
        };

        let message_id = uuid::Uuid::new_v4().to_string();
        let body = replace_result_body(&message_id, sourcedid, grade);
        let hash = body_hash(body.as_bytes());
        let signed = OAuthSigner::new(consumer).sign("POST", &url, &[], Some(hash.as_str()));

        let response = self
            .http_client
            .post(url.as_str())
            .header(CONTENT_TYPE, "application/xml")
            .header(AUTHORIZATION, signed.authorization_header())
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    url = %url,
                    message_id = %message_id,
                    grade,
                    "Grade posted"
                );
                true
            }
            Ok(response) => {
                tracing::warn!(
                    url = %url,
                    status = response.status().as_u16(),
                    "Outcome service rejected grade"
                );
                false
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to post grade");
                false
            }
        }
    }
}

/// Builds the IMS POX `replaceResultRequest` envelope.
#[must_use]
pub fn replace_result_body(message_id: &str, sourcedid: &str, score: f64) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<imsx_POXEnvelopeRequest xmlns="{POX_NAMESPACE}">
  <imsx_POXHeader>
    <imsx_POXRequestHeaderInfo>
      <imsx_version>V1.0</imsx_version>
      <imsx_messageIdentifier>{}</imsx_messageIdentifier>
    </imsx_POXRequestHeaderInfo>
  </imsx_POXHeader>
  <imsx_POXBody>
    <replaceResultRequest>
      <resultRecord>
        <sourcedGUID>
          <sourcedId>{}</sourcedId>
        </sourcedGUID>
        <result>
          <resultScore>
            <language>en</language>
            <textString>{}</textString>
          </resultScore>
        </result>
      </resultRecord>
    </replaceResultRequest>
  </imsx_POXBody>
</imsx_POXEnvelopeRequest>"#,
        xml_escape(message_id),
        xml_escape(sourcedid),
        score
    )
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use crate::oauth1::parse_authorization_header;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SOURCEDID: &str = "MITx/ODL_ENG/2014_T1:edge.edx.org-i4x-MITx-ODL_ENG-lti-94173d3e:0084";

    fn client(url_fix: UrlFixupTable) -> OutcomeClient {
        let registry =
            ConsumerRegistry::new([Consumer::new("__consumer_key__", "__lti_secret__")]).unwrap();
        let config = OutcomeConfig {
            request_timeout: Duration::from_secs(2),
        };
        OutcomeClient::new(Arc::new(registry), url_fix, &config)
    }

    fn context(outcome_url: &str) -> LaunchContext {
        LaunchContext {
            consumer_key: "__consumer_key__".to_string(),
            lis_result_sourcedid: Some(SOURCEDID.to_string()),
            lis_outcome_service_url: Some(outcome_url.to_string()),
            is_trusted: true,
            ..LaunchContext::default()
        }
    }

    #[test]
    fn test_replace_result_body() {
        let body = replace_result_body("m1", "a<b>&c", 0.5);
        assert!(body.contains("<imsx_messageIdentifier>m1</imsx_messageIdentifier>"));
        assert!(body.contains("<sourcedId>a&lt;b&gt;&amp;c</sourcedId>"));
        assert!(body.contains("<textString>0.5</textString>"));
        assert!(body.contains(POX_NAMESPACE));
    }

    #[tokio::test]
    async fn test_post_grade_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/grade_handler"))
            .and(header_exists("authorization"))
            .and(body_string_contains("<textString>1</textString>"))
            .and(body_string_contains(SOURCEDID))
            .respond_with(ResponseTemplate::new(200).set_body_string("success"))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = context(&format!("{}/grade_handler", server.uri()));
        assert!(client(UrlFixupTable::new()).post_grade(&ctx, 1.0).await);
    }

    #[tokio::test]
    async fn test_post_grade_signed_with_body_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let ctx = context(&format!("{}/grade_handler", server.uri()));
        assert!(client(UrlFixupTable::new()).post_grade(&ctx, 0.25).await);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];

        let header = request.headers.get("authorization").unwrap().to_str().unwrap();
        let params = parse_authorization_header(header).unwrap();
        let get = |name: &str| {
            params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("oauth_consumer_key").as_deref(), Some("__consumer_key__"));
        assert_eq!(get("oauth_body_hash"), Some(body_hash(&request.body)));
        assert!(get("oauth_signature").is_some());
    }

    #[tokio::test]
    async fn test_post_grade_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ctx = context(&format!("{}/grade_handler", server.uri()));
        assert!(!client(UrlFixupTable::new()).post_grade(&ctx, 0.5).await);
    }

    #[tokio::test]
    async fn test_post_grade_out_of_range_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let ctx = context(&format!("{}/grade_handler", server.uri()));
        let client = client(UrlFixupTable::new());
        assert!(!client.post_grade(&ctx, 2.0).await);
        assert!(!client.post_grade(&ctx, -0.1).await);
        assert!(!client.post_grade(&ctx, f64::NAN).await);
    }

    #[tokio::test]
    async fn test_post_grade_unknown_consumer() {
        let server = MockServer::start().await;
        let mut ctx = context(&format!("{}/grade_handler", server.uri()));
        ctx.consumer_key = "stranger".to_string();
        assert!(!client(UrlFixupTable::new()).post_grade(&ctx, 0.5).await);
    }

    #[tokio::test]
    async fn test_post_grade_missing_outcome_data() {
        let mut ctx = context("http://127.0.0.1:1/grade");
        ctx.lis_result_sourcedid = None;
        assert!(!client(UrlFixupTable::new()).post_grade(&ctx, 0.5).await);

        let mut ctx = context("http://127.0.0.1:1/grade");
        ctx.lis_outcome_service_url = None;
        assert!(!client(UrlFixupTable::new()).post_grade(&ctx, 0.5).await);
    }

    #[tokio::test]
    async fn test_post_grade_transport_error() {
        // Port 1 is never listening.
        let ctx = context("http://127.0.0.1:1/grade");
        assert!(!client(UrlFixupTable::new()).post_grade(&ctx, 0.5).await);
    }

    #[tokio::test]
    async fn test_post_grade_follows_url_fix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dev_stack"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let advertised = "https://lms.invalid/dev_stack";
        let table = UrlFixupTable::new().with_rule(
            "https://lms.invalid/",
            advertised,
            format!("{}/dev_stack", server.uri()),
        );
        let client = client(table);
        let ctx = context(advertised);

        assert_eq!(
            client.target_url(&ctx),
            Some(format!("{}/dev_stack", server.uri()))
        );
        assert!(client.post_grade(&ctx, 1.0).await);
    }
}
