//! envbus demo
//!
//! Wires a channel and an envelope over an in-process window pair:
//! - handshake with the configured retry policy
//! - one request each way, a notification and a shared value
//! - disposal of both sides

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

use envbus_core::protocol::{ChannelType, InitContext, TargetOrigin};
use envbus_core::{BusError, Result};
use envbus_runtime::api::{ApiContract, NotificationMethod, RequestHandlers, RequestMethod, SharedValue};
use envbus_runtime::endpoint::{BusEndpoint, ChannelOptions, EnvelopeOptions};
use envbus_runtime::{config, lifecycle, transport};

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    path: String,
    content: String,
}

// Envelope API
const CONTENT_CHANGED: RequestMethod<Content, bool> = RequestMethod::new("editor_contentChanged");
const LOCALE_CHANGE: NotificationMethod<String> = NotificationMethod::new("i18n_localeChange");

// Channel API
const CONTENT_REQUEST: RequestMethod<(), Content> = RequestMethod::new("editor_contentRequest");
const READY: NotificationMethod<()> = NotificationMethod::new("editor_ready");

// Both sides
const THEME: SharedValue<String> = SharedValue::new("editor_theme");

fn envelope_api() -> ApiContract {
    ApiContract::new("editor-envelope")
        .request(&CONTENT_CHANGED)
        .notification(&LOCALE_CHANGE)
        .shared(&THEME)
}

fn channel_api() -> ApiContract {
    ApiContract::new("editor-channel")
        .request(&CONTENT_REQUEST)
        .notification(&READY)
        .shared(&THEME)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "envbus.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    let locator = cfg.locator.build_locator();

    let file = "diagram.dmn";
    let mapping = locator
        .mapping_for(file)
        .ok_or_else(|| BusError::Config(format!("no envelope mapping for {file}")))?;
    tracing::info!(file, envelope = %mapping.envelope_path, "envelope located");

    // The envelope page is served from the locator's origin.
    let envelope_origin = match &locator.target_origin {
        TargetOrigin::Exact(origin) => origin.as_str(),
        TargetOrigin::Any => "null",
    };
    let ((host_port, host_inbound), (frame_port, frame_inbound)) =
        transport::memory::pair(&cfg.endpoint.origin, envelope_origin);

    let channel_handlers = RequestHandlers::new();
    channel_handlers.on(&CONTENT_REQUEST, |()| async {
        Ok(Content {
            path: "diagram.dmn".into(),
            content: "<definitions/>".into(),
        })
    });

    let init_context = InitContext {
        file_extension: "dmn".into(),
        resources_path_prefix: mapping.resources_path_prefix.clone(),
        initial_locale: "en-US".into(),
        is_read_only: false,
        channel: ChannelType::Embedded,
    };
    let channel = BusEndpoint::channel(
        ChannelOptions::from_config(&cfg, init_context, channel_handlers, envelope_api()),
        host_port,
        host_inbound,
    )?;

    let initializer = lifecycle::from_fn(|ctx: InitContext| async move {
        tracing::info!(extension = %ctx.file_extension, locale = %ctx.initial_locale, "building envelope api");
        let handlers = RequestHandlers::new();
        handlers.on(&CONTENT_CHANGED, |c: Content| async move {
            tracing::info!(path = %c.path, bytes = c.content.len(), "content changed");
            Ok(true)
        });
        Ok(handlers)
    });
    let envelope = BusEndpoint::envelope(
        EnvelopeOptions::for_host(&cfg, initializer, channel_api()),
        frame_port,
        frame_inbound,
    );

    envelope
        .notifications()
        .subscribe(&LOCALE_CHANGE, |locale: String| tracing::info!(%locale, "locale changed"));
    channel.shared().provide_default(&THEME, "light".to_string())?;

    channel.wait_connected().await?;
    tracing::info!(channel = %channel.id(), envelope = %envelope.id(), "connected");

    let content = envelope.requests().call(&CONTENT_REQUEST, ()).await?;
    let accepted = channel.requests().call(&CONTENT_CHANGED, content).await?;
    tracing::info!(accepted, "round trip done");

    channel.notifications().send(&LOCALE_CHANGE, "pt-BR".to_string())?;
    envelope
        .shared()
        .subscribe(&THEME, |theme: String| tracing::info!(%theme, "theme"))?;
    channel.shared().set(&THEME, "dark".to_string())?;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    print!("{}", channel.metrics().render());

    envelope.dispose();
    channel.dispose();
    Ok(())
}
