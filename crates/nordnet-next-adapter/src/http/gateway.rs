/*
[INPUT]:  HTTP method, endpoint path, optional JSON payload and the current session
[OUTPUT]: Parsed JSON response or a typed error
[POS]:    HTTP layer - authenticated REST pass-through
[UPDATE]: When changing request encoding or the authentication guard
*/

use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::auth::SessionStore;
use crate::http::{NordnetError, RestClient, Result};

/// Forwards REST calls with the session's basic credentials.
///
/// Calls made without a session fail with [`NordnetError::NotAuthenticated`]
/// and never reach the network.
#[derive(Debug, Clone)]
pub struct CallGateway {
    rest: RestClient,
    session: SessionStore,
}

impl CallGateway {
    pub fn new(rest: RestClient, session: SessionStore) -> Self {
        Self { rest, session }
    }

    /// Call `endpoint` relative to the API base URL.
    ///
    /// For `GET`, `DELETE` and `HEAD`, `data` must be a JSON object and is sent as
    /// the query string; other methods send it as the JSON body.
    pub async fn call(&self, method: Method, endpoint: &str, data: Option<&Value>) -> Result<Value> {
        let Some(authorization) = self.session.authorization() else {
            warn!(%method, endpoint, "call attempted without a session");
            return Err(NordnetError::NotAuthenticated);
        };

        let mut builder = self
            .rest
            .request(method.clone(), endpoint)?
            .header(AUTHORIZATION, authorization);

        match data {
            None | Some(Value::Null) => {}
            Some(data) if sends_query(&method) => {
                let Value::Object(params) = data else {
                    return Err(NordnetError::InvalidArgument(format!(
                        "{method} parameters must be a JSON object"
                    )));
                };
                builder = builder.query(params);
            }
            Some(data) => builder = builder.json(data),
        }

        debug!(%method, endpoint, "api call");
        match self.rest.send_json(builder).await {
            Err(e) if e.is_transport_error() => {
                error!(%method, endpoint, error = %e, "api call failed in transport");
                Err(e)
            }
            result => result,
        }
    }

    pub async fn get(&self, endpoint: &str, params: Option<&Value>) -> Result<Value> {
        self.call(Method::GET, endpoint, params).await
    }

    pub async fn post(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.call(Method::POST, endpoint, body).await
    }

    pub async fn put(&self, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        self.call(Method::PUT, endpoint, body).await
    }

    pub async fn delete(&self, endpoint: &str, params: Option<&Value>) -> Result<Value> {
        self.call(Method::DELETE, endpoint, params).await
    }
}

fn sends_query(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::DELETE | Method::HEAD)
}
