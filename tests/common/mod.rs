#![allow(dead_code)]

// crates.io
use tokio::task::JoinHandle;
// self
use oauth2_implicit::{
	_preludet::*,
	auth::TokenSecret,
	flows::Broker,
	host::RecordingNavigator,
	store::MemoryStorage,
};

/// Resource mapped to `https://graph.example.com/` by the test configuration.
pub const GRAPH: &str = "https://graph.example.com";

/// Yields until `navigator` has recorded `count` hidden-frame loads.
pub async fn wait_for_frames(navigator: &RecordingNavigator, count: usize) {
	for _ in 0..64 {
		if navigator.frame_loads().len() >= count {
			return;
		}

		tokio::task::yield_now().await;
	}

	panic!("Expected {count} frame loads, saw {:?}.", navigator.frame_loads());
}

/// Correlation state carried by the `index`-th hidden-frame load.
pub fn frame_state(navigator: &RecordingNavigator, index: usize) -> String {
	let (_, url) = navigator.frame_loads().get(index).cloned().expect("Frame load should exist.");

	query_param(&url, "state").expect("Frame URL should carry a state.")
}

/// Spawns `acquire_token` for `resource` on the test runtime.
pub fn spawn_acquire(broker: &Broker, resource: &str) -> JoinHandle<Result<TokenSecret>> {
	let broker = broker.clone();
	let resource = resource.to_owned();

	tokio::spawn(async move { broker.acquire_token(&resource).await })
}

/// Harness whose storage already holds a user with a login token valid for an hour.
pub fn signed_in_harness() -> TestHarness {
	let config = test_config();
	let storage = Arc::new(MemoryStorage::default());

	seed_signed_in_user(&config, storage.clone(), test_epoch() + Duration::hours(1));

	build_test_broker_with(config, storage)
}
