#![cfg(feature = "reqwest")]

// std
use std::time::Duration;
// crates.io
use httpmock::prelude::*;
use tokio::sync::mpsc;
// self
use fair_poller::{
	api::{ApiClient, ApiConfig},
	auth::{Credential, PollTarget},
	error::{BoxError, Error},
	poller::{EndpointTemplate, FairPoller, PollerConfig},
	rate_limit::RetrySource,
	registry::PollerRegistry,
	serde_json::Value,
};

fn api_config(server: &MockServer) -> ApiConfig {
	ApiConfig::parse(&server.base_url()).expect("Mock server URL should parse.")
}

#[tokio::test]
async fn requests_carry_the_bearer_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/2/users/me").header("authorization", "Bearer token-a");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"data\":{\"id\":\"2244994945\",\"username\":\"XDevelopers\"}}");
		})
		.await;
	let api = ApiClient::with_reqwest(api_config(&server));
	let account =
		api.account_id(&Credential::new("token-a")).await.expect("Identity lookup should succeed.");

	assert_eq!(account.as_ref(), "2244994945");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rate_limit_headers_are_parsed() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/2/tweets/search/recent");
			then.status(429).header("retry-after", "17").header("x-rate-limit-reset", "1");
		})
		.await;
	let api = ApiClient::with_reqwest(api_config(&server));
	let err = api
		.fetch(&Credential::new("token"), "2/tweets/search/recent")
		.await
		.expect_err("429 should surface from fetch.");
	let directive = err.retry_directive().expect("Retry-After should be parsed.");

	assert_eq!(directive.source, RetrySource::RetryAfter);
	assert_eq!(directive.delay(), Duration::from_secs(17));
}

#[tokio::test]
async fn server_errors_keep_a_body_preview() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/2/users/me");
			then.status(503).body("over capacity");
		})
		.await;
	let api = ApiClient::with_reqwest(api_config(&server));
	let err = api.account_id(&Credential::new("token")).await.expect_err("503 should fail.");

	match err {
		Error::Request { status, body_preview, .. } => {
			assert_eq!(status, 503);
			assert_eq!(body_preview, "over capacity");
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn registry_polls_through_reqwest() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let identity = server
		.mock_async(|when, then| {
			when.method(GET).path("/2/users/me");
			then.status(200).body("{\"data\":{\"id\":\"42\"}}");
		})
		.await;
	let timeline = server
		.mock_async(|when, then| {
			when.method(GET).path("/2/users/7/tweets").query_param("max_results", "5");
			then.status(200).body("{\"data\":[{\"id\":\"1\",\"text\":\"hello\"}]}");
		})
		.await;
	let registry = PollerRegistry::with_reqwest(api_config(&server));
	let endpoint = EndpointTemplate::new("2/users/%s/tweets?max_results=5")?;
	let config =
		PollerConfig::new(1, Duration::from_secs(1), endpoint, Credential::new("token"));
	let poller: FairPoller = registry.get_poller(config).await?;
	let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
	let subscription = poller.register(PollTarget::new("7")?, move |payload| {
		let _ = tx.send((*payload).clone());

		async { Ok::<(), BoxError>(()) }
	});
	let payload = rx.recv().await.expect("Poll result should be delivered.");

	assert_eq!(payload["data"][0]["text"], "hello");
	assert!(subscription.unregister());

	identity.assert_calls_async(1).await;
	assert!(timeline.calls_async().await >= 1);

	Ok(())
}
