//! Scripted in-process transport shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	sync::Arc,
};
// crates.io
use parking_lot::Mutex;
use tokio::{
	sync::{Semaphore, mpsc},
	time::Instant,
};
// self
use fair_poller::{
	api::{ApiClient, ApiConfig},
	error::TransportError,
	http::{HttpFuture, HttpRequest, HttpResponse, PollHttpClient},
	serde_json::json,
};

pub const BASE_URL: &str = "https://upstream.test/";

/// One request observed by [`FakeHttp`].
#[derive(Clone, Debug)]
pub struct Call {
	pub at: Instant,
	pub path: String,
	pub token: String,
}

pub enum Reply {
	Respond(HttpResponse),
	Panic,
}

/// Answers scripted replies first, then falls back to canned identity and echo responses.
///
/// The echo body is `{"path": "<request path>"}`. Identity lookups answer with the account
/// registered for the bearer token (or the token itself), and handle lookups with
/// `id-<handle>`.
pub struct FakeHttp {
	calls: mpsc::UnboundedSender<Call>,
	script: Mutex<VecDeque<Reply>>,
	accounts: Mutex<HashMap<String, String>>,
	gate: Option<Arc<Semaphore>>,
}
impl FakeHttp {
	pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Call>) {
		Self::build(None)
	}

	/// Every request blocks after being recorded until a permit is added to `gate`.
	pub fn gated(gate: Arc<Semaphore>) -> (Arc<Self>, mpsc::UnboundedReceiver<Call>) {
		Self::build(Some(gate))
	}

	fn build(gate: Option<Arc<Semaphore>>) -> (Arc<Self>, mpsc::UnboundedReceiver<Call>) {
		let (calls, rx) = mpsc::unbounded_channel();
		let fake = Self {
			calls,
			script: Mutex::new(VecDeque::new()),
			accounts: Mutex::new(HashMap::new()),
			gate,
		};

		(Arc::new(fake), rx)
	}

	pub fn push(&self, reply: Reply) {
		self.script.lock().push_back(reply);
	}

	pub fn push_response(&self, response: HttpResponse) {
		self.push(Reply::Respond(response));
	}

	pub fn set_account(&self, token: &str, account: &str) {
		self.accounts.lock().insert(token.to_owned(), account.to_owned());
	}

	fn fallback(&self, path: &str, token: &str) -> HttpResponse {
		let body = if path.ends_with("users/me") {
			let account = self.accounts.lock().get(token).cloned().unwrap_or_else(|| token.to_owned());

			json!({ "data": { "id": account } })
		} else if let Some(handle) = path.strip_prefix("2/users/by/username/") {
			json!({ "data": { "id": format!("id-{handle}") } })
		} else {
			json!({ "path": path })
		};

		HttpResponse::new(200, body.to_string())
	}
}
impl PollHttpClient for FakeHttp {
	fn get(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			let path = request.url.path().trim_start_matches('/').to_owned();
			let token = request.credential.expose().to_owned();

			let _ = self.calls.send(Call { at: Instant::now(), path: path.clone(), token: token.clone() });

			if let Some(gate) = &self.gate {
				gate.acquire().await.map_err(TransportError::network)?.forget();
			}

			let reply = self.script.lock().pop_front();

			match reply {
				Some(Reply::Respond(response)) => Ok(response),
				Some(Reply::Panic) => panic!("Scripted transport panic."),
				None => Ok(self.fallback(&path, &token)),
			}
		})
	}
}

pub fn api_client(fake: &Arc<FakeHttp>) -> ApiClient {
	let config = ApiConfig::parse(BASE_URL).expect("Fake base URL should parse.");

	ApiClient::new(config, fake.clone())
}

/// Drains the calls recorded so far without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Call>) -> Vec<Call> {
	let mut calls = Vec::new();

	while let Ok(call) = rx.try_recv() {
		calls.push(call);
	}

	calls
}
