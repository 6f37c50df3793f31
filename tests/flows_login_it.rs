// self
use oauth2_implicit::{
	_preludet::*,
	config::ClientConfig,
	flows::CallbackOutcome,
	store::MemoryStorage,
};

fn start_login(harness: &TestHarness) -> (String, String) {
	harness.broker.login().expect("Login redirect should be issued.");

	let redirect = harness.navigator.redirects().pop().expect("Login should redirect.");
	let state = query_param(&redirect, "state").expect("Login URL should carry a state.");
	let nonce = query_param(&redirect, "nonce").expect("Login URL should carry a nonce.");

	(state, nonce)
}

#[test]
fn login_redirect_carries_the_interactive_request() {
	let config = ClientConfig::builder(TEST_CLIENT_ID)
		.tenant("contoso.onmicrosoft.com")
		.redirect_uri(TEST_REDIRECT_URI)
		.extra_query_parameter("dc", "eu")
		.build()
		.expect("Login configuration should be valid.");
	let harness = build_test_broker_with(config, Arc::new(MemoryStorage::default()));

	harness.broker.login().expect("Login redirect should be issued.");
	// A second call while the first is outstanding does nothing.
	harness.broker.login().expect("Repeated login should be ignored.");

	let redirects = harness.navigator.redirects();

	assert_eq!(redirects.len(), 1);

	let url = &redirects[0];

	assert_eq!(
		url.as_str().split('?').next(),
		Some("https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/authorize")
	);
	assert_eq!(query_param(url, "response_type").as_deref(), Some("id_token"));
	assert_eq!(query_param(url, "client_id").as_deref(), Some(TEST_CLIENT_ID));
	assert_eq!(query_param(url, "redirect_uri").as_deref(), Some(TEST_REDIRECT_URI));
	assert_eq!(query_param(url, "response_mode").as_deref(), Some("fragment"));
	assert_eq!(query_param(url, "scope").as_deref(), Some("openid"));
	assert_eq!(query_param(url, "dc").as_deref(), Some("eu"));
	assert_eq!(query_param(url, "prompt"), None);
	assert!(harness.broker.login_in_progress());
	assert_eq!(
		harness.broker.store().login_state().expect("Login state read should succeed."),
		query_param(url, "state")
	);
}

#[test]
fn login_response_signs_the_user_in() {
	let harness = build_test_broker();
	let (state, nonce) = start_login(&harness);
	let expires_at = test_epoch() + Duration::hours(1);
	let id_token = user_id_token(Some(&nonce), expires_at);
	let outcome = harness
		.broker
		.handle_callback(&format!("#id_token={id_token}&state={state}"))
		.expect("Login callback should be handled.");

	assert_eq!(
		outcome,
		CallbackOutcome::LoggedIn {
			user_name: TEST_USER.into(),
			return_to: Some(Url::parse(TEST_REDIRECT_URI).expect("Redirect URI should parse.")),
		}
	);

	let session = harness.broker.user_info();

	assert!(session.authenticated);
	assert!(session.login_cached);
	assert_eq!(session.user_name, TEST_USER);
	assert_eq!(session.last_error, None);
	assert!(!harness.broker.login_in_progress());
	assert_eq!(
		harness.broker.store().login_state().expect("Login state read should succeed."),
		None
	);
	assert_eq!(harness.broker.expiry_armed_at(), Some(expires_at - Duration::seconds(300)));
	assert_eq!(harness.navigator.fragment_clears(), 1);
}

#[test]
fn login_response_with_a_foreign_nonce_is_rejected() {
	let harness = build_test_broker();
	let (state, _) = start_login(&harness);
	let id_token = user_id_token(Some("forged"), test_epoch() + Duration::hours(1));
	let outcome = harness
		.broker
		.handle_callback(&format!("id_token={id_token}&state={state}"))
		.expect("Login callback should be handled.");

	assert!(matches!(
		outcome,
		CallbackOutcome::LoginFailed { ref code, .. } if code == "invalid_id_token"
	));

	let session = harness.broker.user_info();

	assert!(!session.authenticated);
	assert!(!session.login_cached);
	assert!(session.last_error.is_some());
	assert!(harness.broker.store().id_token().expect("ID token read should succeed.").is_none());
	assert!(!harness.broker.login_in_progress());
}

#[test]
fn login_error_is_recorded() {
	let harness = build_test_broker();
	let (state, _) = start_login(&harness);
	let outcome = harness
		.broker
		.handle_callback(&format!(
			"error=access_denied&error_description=User+cancelled&state={state}"
		))
		.expect("Login callback should be handled.");

	assert_eq!(
		outcome,
		CallbackOutcome::LoginFailed {
			code: "access_denied".into(),
			description: Some("User cancelled".into()),
		}
	);
	assert_eq!(
		harness.broker.store().login_error().expect("Login error read should succeed."),
		Some("User cancelled".into())
	);

	// The error survives a reload.
	let session = harness.broker.refresh_data_from_cache().expect("Session should rebuild.");

	assert_eq!(session.last_error.as_deref(), Some("User cancelled"));
}

#[test]
fn logout_clears_everything_and_redirects() {
	let config = test_config();
	let storage = Arc::new(MemoryStorage::default());

	seed_signed_in_user(&config, storage.clone(), test_epoch() + Duration::hours(1));

	let harness = build_test_broker_with(config, storage);

	assert!(harness.broker.user_info().authenticated);

	harness.broker.logout().expect("Logout should succeed.");

	let redirects = harness.navigator.redirects();
	let url = redirects.last().expect("Logout should redirect.");

	assert_eq!(url.path(), "/contoso.onmicrosoft.com/oauth2/logout");
	assert_eq!(query_param(url, "post_logout_redirect_uri").as_deref(), Some(TEST_REDIRECT_URI));
	assert!(harness.storage.is_empty());
	assert_eq!(harness.broker.user_info(), Default::default());
	assert_eq!(harness.broker.expiry_armed_at(), None);
	assert_eq!(harness.scheduler.pending(), 0);
}
