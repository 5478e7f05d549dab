//! The trusted launch context persisted in the session.
//!
//! A [`LaunchContext`] is built exactly once per successful signed launch
//! from the request's LTI parameters and stored as session attributes. It
//! changes only when the session is closed (trust flag cleared) or when a
//! new launch overwrites it entirely.

use serde::{Deserialize, Serialize};

use crate::session::SessionAttributes;
use crate::verifier::LaunchRequest;

/// Session attribute holding the trust flag.
pub const LTI_SESSION_KEY: &str = "lti_authenticated";

/// LTI launch data carried between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchContext {
    /// Consumer that signed the launch.
    #[serde(rename = "oauth_consumer_key")]
    pub consumer_key: String,

    /// Opaque LMS user identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// LIS roles, e.g. `Instructor` or `urn:lti:role:ims/lis/Learner`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Placement of the tool inside the LMS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_link_id: Option<String>,

    /// Identifies the gradebook cell for outcome posts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lis_result_sourcedid: Option<String>,

    /// Outcome service endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lis_outcome_service_url: Option<String>,

    /// Course identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// Course title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_title: Option<String>,

    /// Display name of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lis_person_name_full: Option<String>,

    /// Primary e-mail of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lis_person_contact_email_primary: Option<String>,

    /// Where to send the user when they leave the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_presentation_return_url: Option<String>,

    /// Whether this session may satisfy `session` mode.
    #[serde(rename = "lti_authenticated")]
    pub is_trusted: bool,
}

impl LaunchContext {
    /// Builds a trusted context from a verified launch.
    #[must_use]
    pub fn from_request(request: &LaunchRequest, consumer_key: impl Into<String>) -> Self {
        let param = |name: &str| request.param(name).filter(|v| !v.is_empty());

        Self {
            consumer_key: consumer_key.into(),
            user_id: param("user_id"),
            roles: param("roles")
                .map(|r| {
                    r.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            resource_link_id: param("resource_link_id"),
            lis_result_sourcedid: param("lis_result_sourcedid"),
            lis_outcome_service_url: param("lis_outcome_service_url"),
            context_id: param("context_id"),
            context_title: param("context_title"),
            lis_person_name_full: param("lis_person_name_full"),
            lis_person_contact_email_primary: param("lis_person_contact_email_primary"),
            launch_presentation_return_url: param("launch_presentation_return_url"),
            is_trusted: true,
        }
    }

    /// Returns true if the user holds `role`.
    ///
    /// Matches both the short form (`Instructor`) and the URN form
    /// (`urn:lti:role:ims/lis/Instructor`).
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| {
            r.eq_ignore_ascii_case(role)
                || r.rsplit('/')
                    .next()
                    .is_some_and(|short| short.eq_ignore_ascii_case(role))
        })
    }

    /// Serializes the context into session attributes.
    #[must_use]
    pub fn to_attributes(&self) -> SessionAttributes {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => SessionAttributes::new(),
        }
    }

    /// Reads a context back from session attributes.
    ///
    /// Returns `None` when the attributes do not describe a launch. A
    /// missing or non-boolean trust flag reads as untrusted.
    #[must_use]
    pub fn from_attributes(attributes: &SessionAttributes) -> Option<Self> {
        let trusted = attributes
            .get(LTI_SESSION_KEY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        let mut context: Self =
            serde_json::from_value(serde_json::Value::Object(attributes.clone())).ok()?;
        context.is_trusted = trusted;
        Some(context)
    }
}
