//! Fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use http::{HeaderMap, Request, Response, StatusCode};

use crate::environment::{Environment, SERVICE_HOST_ENV, SERVICE_PORT_ENV};
use crate::error::BoxError;
use crate::transport::{ByteStream, Transport};

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Debug, Default)]
pub(crate) struct FakeEnvironment {
    vars: HashMap<String, String>,
    token: Option<String>,
}

impl FakeEnvironment {
    pub(crate) fn in_cluster(host: &str, port: &str, token: Option<&str>) -> Self {
        Self {
            token: token.map(String::from),
            ..Self::default()
        }
        .with_var(SERVICE_HOST_ENV, host)
        .with_var(SERVICE_PORT_ENV, port)
    }

    pub(crate) fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub(crate) fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl Environment for FakeEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn bearer_token(&self) -> BoxFuture<'static, Option<String>> {
        futures::future::ready(self.token.clone()).boxed()
    }
}

/// What the scripted transport does with the next request.
pub(crate) enum Reply {
    /// Respond with a status and these body chunks, then end the body.
    Body(StatusCode, Vec<&'static [u8]>),
    /// Respond with a status and these body chunks, then keep the body open forever.
    Open(StatusCode, Vec<&'static [u8]>),
    /// Respond with these chunks followed by a body error.
    BodyError(StatusCode, Vec<&'static [u8]>),
    /// Fail before any response arrives.
    Fail,
    /// Never respond.
    Hang,
}

#[derive(Clone, Debug)]
pub(crate) struct Recorded {
    pub(crate) uri: String,
    pub(crate) headers: HeaderMap,
}

/// Transport replaying a fixed script of replies, one per request.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            requests: Arc::default(),
        }
    }

    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn chunks(chunks: Vec<&'static [u8]>) -> impl futures::Stream<Item = Result<Bytes, BoxError>> {
    stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))))
}

fn respond(status: StatusCode, body: ByteStream) -> Response<ByteStream> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

impl Transport for ScriptedTransport {
    fn execute(
        &self,
        request: Request<Vec<u8>>,
    ) -> BoxFuture<'static, Result<Response<ByteStream>, BoxError>> {
        self.requests.lock().unwrap().push(Recorded {
            uri: request.uri().to_string(),
            headers: request.headers().clone(),
        });

        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Hang);

        match reply {
            Reply::Body(status, body) => {
                futures::future::ready(Ok(respond(status, chunks(body).boxed()))).boxed()
            }
            Reply::Open(status, body) => {
                let body = chunks(body).chain(stream::pending()).boxed();
                futures::future::ready(Ok(respond(status, body))).boxed()
            }
            Reply::BodyError(status, body) => {
                let failure = stream::once(async { Err::<Bytes, BoxError>("connection reset".into()) });
                let body = chunks(body).chain(failure).boxed();
                futures::future::ready(Ok(respond(status, body))).boxed()
            }
            Reply::Fail => futures::future::ready(Err("connection refused".into())).boxed(),
            Reply::Hang => futures::future::pending().boxed(),
        }
    }
}
