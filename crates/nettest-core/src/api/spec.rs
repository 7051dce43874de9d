//! Declarative API definitions loaded from configuration files.

use crate::api::endpoint::PatternEndpoint;
use crate::api::mock::ApiDefinition;
use crate::error::MockError;
use crate::mocks::IdentityKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API described as data.
///
/// Two specs with the same `name` override each other while nested, like two
/// instances of the same typed [`ApiDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub name: String,
    pub hostnames: Vec<String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub operation_id: String,
    pub pattern: String,
    /// `[status, body]`, `{"status": .., "body": ..}` or `{"raw": ..}`
    pub response: Value,
}

impl ApiDefinition for ApiSpec {
    fn hostnames(&self) -> Vec<String> {
        self.hostnames.clone()
    }

    fn endpoints(&self) -> Result<Vec<PatternEndpoint>, MockError> {
        self.endpoints
            .iter()
            .map(|e| PatternEndpoint::from_template(e.operation_id.as_str(), &e.pattern, e.response.clone()))
            .collect()
    }

    fn identity(&self) -> IdentityKey {
        IdentityKey::named(self.name.as_str())
    }
}
