mod common;

// self
use common::*;
use oauth2_implicit::{
	_preludet::*,
	auth::ResourceId,
	config::ClientConfig,
	flows::{CallbackOutcome, renew_frame_name},
	store::MemoryStorage,
};

fn harness_with_login_expiring_in(seconds: i64) -> TestHarness {
	let config = test_config();
	let storage = Arc::new(MemoryStorage::default());

	seed_signed_in_user(&config, storage.clone(), test_epoch() + Duration::seconds(seconds));

	build_test_broker_with(config, storage)
}

fn login_resource() -> ResourceId {
	ResourceId::new(TEST_CLIENT_ID).expect("Client id should be a valid resource.")
}

#[test]
fn login_token_is_renewed_ahead_of_expiry() {
	let harness = harness_with_login_expiring_in(400);

	assert!(harness.broker.user_info().authenticated);
	assert_eq!(harness.broker.expiry_armed_at(), Some(test_epoch() + Duration::seconds(100)));
	assert_eq!(harness.scheduler.advance(Duration::seconds(99)), 0);
	assert!(harness.navigator.frame_loads().is_empty());
	assert_eq!(harness.scheduler.advance(Duration::seconds(1)), 1);

	let loads = harness.navigator.frame_loads();

	assert_eq!(loads.len(), 1);
	assert_eq!(loads[0].0, renew_frame_name(&login_resource()));
	assert_eq!(query_param(&loads[0].1, "prompt").as_deref(), Some("none"));
	assert_eq!(harness.broker.expiry_armed_at(), None);

	let state = query_param(&loads[0].1, "state").expect("Renewal URL should carry a state.");
	let nonce = query_param(&loads[0].1, "nonce").expect("Renewal URL should carry a nonce.");
	let renewed_until = test_epoch() + Duration::seconds(400 + 3600);
	let id_token = user_id_token(Some(&nonce), renewed_until);
	let outcome = harness
		.broker
		.handle_callback(&format!("#id_token={id_token}&state={state}"))
		.expect("Renewal callback should be handled.");

	assert_eq!(outcome, CallbackOutcome::Renewed { resource: login_resource() });
	assert_eq!(
		harness.broker.expiry_armed_at(),
		Some(renewed_until - ClientConfig::DEFAULT_RENEWAL_LEAD)
	);
	assert_eq!(
		harness
			.broker
			.store()
			.id_token()
			.expect("ID token read should succeed.")
			.map(|token| token.expose().to_owned()),
		Some(id_token)
	);
	assert!(harness.broker.user_info().authenticated);
}

#[test]
fn overdue_timer_renews_immediately() {
	let harness = harness_with_login_expiring_in(200);

	assert_eq!(harness.navigator.frame_loads().len(), 1);
	assert_eq!(harness.broker.expiry_armed_at(), None);
	assert!(harness.broker.correlator().pending_state(&login_resource()).is_some());
}

#[test]
fn failed_background_renewal_signs_the_session_out_without_redirecting() {
	let harness = harness_with_login_expiring_in(400);

	harness.scheduler.advance(Duration::seconds(100));

	let state = frame_state(&harness.navigator, 0);
	let outcome = harness
		.broker
		.handle_callback(&format!("error=login_required&state={state}"))
		.expect("Renewal callback should be handled.");

	assert!(matches!(outcome, CallbackOutcome::RenewalFailed { .. }));

	let session = harness.broker.user_info();

	assert!(!session.authenticated);
	assert!(session.token.is_none());
	assert_eq!(session.last_error.as_deref(), Some("login_required"));
	assert!(harness.navigator.redirects().is_empty());
	assert_eq!(harness.broker.expiry_armed_at(), None);
}

#[test]
fn dropping_the_login_token_disarms_the_timer() {
	let harness = signed_in_harness();

	assert!(harness.broker.expiry_armed_at().is_some());

	harness
		.broker
		.clear_cache_for_resource(TEST_CLIENT_ID)
		.expect("Clearing the login resource should succeed.");

	assert_eq!(harness.broker.expiry_armed_at(), None);
	assert!(!harness.broker.user_info().authenticated);
	assert!(harness.broker.user_info().login_cached);
	assert_eq!(harness.scheduler.advance(Duration::hours(2)), 0);
}
