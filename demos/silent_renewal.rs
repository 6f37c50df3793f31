//! Walks through an interactive login, a silent renewal for an API resource, and the
//! background renewal of the login token, with the provider's answers simulated locally.

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::{Result, eyre::eyre};
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use oauth2_implicit::{
	config::ClientConfig,
	flows::Broker,
	host::{ManualClock, ManualScheduler, RecordingNavigator},
	store::MemoryStorage,
};

const CONFIG: &str = r#"{
	"client_id": "demo-spa",
	"tenant": "contoso.onmicrosoft.com",
	"redirect_uri": "https://app.example.com/",
	"endpoints": { "https://graph.example.com/": "https://graph.example.com" },
	"renewal_timeout_seconds": 10
}"#;

fn param(url: &Url, name: &str) -> Result<String> {
	url.query_pairs()
		.find(|(key, _)| key == name)
		.map(|(_, value)| value.into_owned())
		.ok_or_else(|| eyre!("`{name}` is missing from {url}."))
}

// What the provider would mint for the demo user.
fn id_token(nonce: &str, expires_at: OffsetDateTime) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
	let claims = serde_json::json!({
		"aud": "demo-spa",
		"upn": "ada@contoso.com",
		"nonce": nonce,
		"exp": expires_at.unix_timestamp(),
	});

	format!("{header}.{}.", URL_SAFE_NO_PAD.encode(claims.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = ClientConfig::from_json(CONFIG)?;
	let now = OffsetDateTime::now_utc().replace_nanosecond(0)?;
	let clock = ManualClock::new(now);
	let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
	let navigator = Arc::new(RecordingNavigator::new(Url::parse("https://app.example.com/inbox")?));
	let broker = Broker::builder(config)
		.storage(Arc::new(MemoryStorage::default()))
		.navigator(navigator.clone())
		.scheduler(scheduler.clone())
		.clock(Arc::new(clock.clone()))
		.build()?;

	broker.login()?;

	let login = navigator.redirects().pop().ok_or_else(|| eyre!("Login did not redirect."))?;

	println!("Send your user to {login}.");

	let fragment = format!(
		"id_token={}&state={}",
		id_token(&param(&login, "nonce")?, now + Duration::hours(1)),
		param(&login, "state")?
	);

	println!("Login finished: {:?}.", broker.handle_callback(&fragment)?);

	let acquiring = {
		let broker = broker.clone();

		tokio::spawn(async move { broker.acquire_token("https://graph.example.com").await })
	};

	while navigator.frame_loads().is_empty() {
		tokio::time::sleep(StdDuration::from_millis(5)).await;
	}

	let (frame, renew) = navigator.frame_loads().remove(0);

	println!("Hidden frame `{frame}` loads {renew}.");
	broker.handle_callback(&format!(
		"access_token=graph-token&expires_in=3599&state={}",
		param(&renew, "state")?
	))?;

	let token = acquiring.await??;

	println!("Graph token: {token:?}; renewals: {:?}.", broker.renewal_metrics());

	// Fast-forward to five minutes before the login token expires.
	scheduler.advance(Duration::minutes(55));

	match navigator.frame_loads().last() {
		Some((frame, _)) => println!("Background renewal started in `{frame}`."),
		None => println!("No background renewal was due."),
	}

	broker.logout()?;

	println!("Signed out; user info is now {:?}.", broker.user_info());

	Ok(())
}
