use std::sync::Arc;

use grey_mail::api::{AppState, build_router};
use grey_mail::config::AppConfig;
use grey_mail::enrich::{Enricher, RateLimiter, SmartReplier, Summarizer, Tagger};
use grey_mail::llm::create_provider;
use grey_mail::mail::{ImapConnector, MailFetcher};
use grey_mail::tags::TagStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; real env vars take precedence.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  Required: IMAP_SERVER, IMAP_PORT, EMAIL_USER, EMAIL_PASS");
        std::process::exit(1);
    });

    eprintln!("📬 Grey Mail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Mail: {}@{}:{}",
        config.mail.username, config.mail.host, config.mail.port
    );
    eprintln!(
        "   Model: {}{}",
        config.llm.model,
        if config.llm.api_key.is_some() {
            ""
        } else {
            " (no GROQ_API_KEY, using fallbacks)"
        }
    );
    eprintln!("   AI cooldown: {} ms", config.ai_cooldown.as_millis());
    eprintln!("   Tags: {}", config.tags_file.display());

    // ── Components ───────────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let limiter = Arc::new(RateLimiter::new(config.ai_cooldown));
    let tags = Arc::new(TagStore::load(&config.tags_file).await);

    let connector = Arc::new(ImapConnector::new(config.mail.clone())?);
    let enricher = Enricher::new(
        MailFetcher::new(connector),
        Summarizer::new(Arc::clone(&llm), Arc::clone(&limiter)),
        Tagger::new(Arc::clone(&llm), Arc::clone(&limiter)),
        tags.clone(),
    );
    let replier = SmartReplier::new(Arc::clone(&llm), limiter);

    let state = AppState {
        enricher: Arc::new(enricher),
        replier: Arc::new(replier),
        tags,
        llm,
    };

    // ── HTTP server ──────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    eprintln!("   API: http://0.0.0.0:{}\n", config.port);
    tracing::info!(port = config.port, "Grey Mail API started");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
