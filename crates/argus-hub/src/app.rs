//! Application wiring and lifecycle.
//!
//! Builds every component from configuration, spawns the background
//! tasks (pollers, engines, gateway) and owns graceful shutdown: pollers
//! flush their snapshots, enrichment drains, the store exits, all within
//! a bounded deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use argus_alerts::{AlertEngine, AlertEngineConfig, AlertStore};
use argus_core::NotificationDraft;
use argus_enrich::{EnrichConfig, Enricher, HttpSummarizer, SummarizerConfig};
use argus_fanout::{FanoutConfig, QueueConfig};
use argus_gateway::{AppState, GatewayConfig};
use argus_market::{ExchangeClient, ExchangeConfig};
use argus_persistence::{CredentialStore, SnapshotFile};
use argus_pollers::{
    spawn_poller, spawn_price_poller, HttpNewsProvider, HttpSocialProvider, NewsConfig,
    NewsPoller, PollerHandle, PollerRuntimeConfig, PricePollerConfig, SentimentGauge,
    SignalConfig, SignalGenerator, SocialConfig, SocialPoller,
};
use argus_store::{spawn_store, StoreConfig, StoreHandle};
use argus_threat::{run_threat_detector, ThreatConfig};
use argus_trading::{PositionsView, TradingClient, TradingConfig};
use argus_tts::{HttpTtsProvider, ProviderConfig, TtsConfig, TtsService};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Deadline for each stage of graceful shutdown.
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Read a secret: environment variable first, credential file second.
fn secret(env_name: &str, credentials: &CredentialStore, file_key: &str) -> Option<String> {
    std::env::var(env_name)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| credentials.get(file_key).map(str::to_string))
}

/// The assembled application.
pub struct Application {
    store: StoreHandle,
    poller_handles: Vec<PollerHandle>,
    /// Poller tasks, joined on shutdown so final snapshots flush.
    poller_joins: Vec<JoinHandle<()>>,
    /// Draft sender kept so it can be dropped to drain enrichment.
    drafts_tx: Option<mpsc::Sender<NotificationDraft>>,
    enrich_join: JoinHandle<()>,
    store_join: JoinHandle<()>,
    /// Tasks aborted (not drained) on shutdown.
    background: Vec<JoinHandle<()>>,
}

impl Application {
    /// Build and spawn everything. Must run inside the tokio runtime.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let credentials = CredentialStore::load(&config.credentials_path)
            .map_err(|e| AppError::Init(format!("credentials: {e}")))?;
        let snapshot = Arc::new(SnapshotFile::new(&config.snapshot_path));

        let http_timeout = Duration::from_secs(config.timeouts.http_secs);
        let market = Arc::new(
            ExchangeClient::new(ExchangeConfig {
                base_url: config.exchange_url.clone(),
                timeout: http_timeout,
                retry: Default::default(),
            })
            .map_err(|e| AppError::Init(format!("exchange client: {e}")))?,
        );
        let trading = Arc::new(
            TradingClient::new(TradingConfig {
                base_url: config.trading_url.clone(),
                timeout: http_timeout,
            })
            .map_err(|e| AppError::Init(format!("trading client: {e}")))?,
        );

        let (store, store_join) = spawn_store(StoreConfig {
            retention_cap: config.retention_cap,
            event_buffer: 256,
        });

        let summarizer = HttpSummarizer::new(SummarizerConfig {
            base_url: config.ai_url.clone(),
            timeout: Duration::from_secs(config.timeouts.ai_secs),
        })
        .map_err(|e| AppError::Init(format!("summarizer: {e}")))?;
        let enricher = Arc::new(Enricher::new(
            store.clone(),
            Arc::new(summarizer),
            EnrichConfig::default(),
        ));

        let mut vendors = Vec::with_capacity(config.tts.vendors.len());
        for vendor in &config.tts.vendors {
            let api_key = secret(&vendor.api_key_env, &credentials, &vendor.name);
            let provider = HttpTtsProvider::new(ProviderConfig {
                name: vendor.name.clone(),
                base_url: vendor.base_url.clone(),
                voice: vendor.voice.clone(),
                api_key,
                timeout: Duration::from_secs(config.timeouts.tts_secs),
            })
            .map_err(|e| AppError::Init(format!("tts vendor {}: {e}", vendor.name)))?;
            vendors.push(provider);
        }
        let tts = Arc::new(TtsService::new(
            vendors,
            TtsConfig {
                failure_backoff: Duration::from_secs(config.tts.failure_backoff_secs),
                cache_cap: config.tts.cache_cap,
            },
        ));

        let alerts = Arc::new(AlertStore::new());
        let sentiment = Arc::new(SentimentGauge::new(Duration::from_secs(
            config.social.sentiment_freshness_secs,
        )));
        let positions = Arc::new(PositionsView::new());
        let (price_bus, _) = broadcast::channel(1024);
        let (drafts_tx, mut drafts_rx) = mpsc::channel::<NotificationDraft>(256);

        // Enrichment worker: the single consumer of all draft producers.
        let enrich_join = {
            let enricher = enricher.clone();
            tokio::spawn(async move {
                while let Some(draft) = drafts_rx.recv().await {
                    if let Err(e) = enricher.enrich(draft).await {
                        warn!(error = %e, "Enrichment failed, draft dropped");
                    }
                }
                info!("Enrichment worker drained");
            })
        };

        let mut poller_handles = Vec::new();
        let mut poller_joins = Vec::new();
        let mut background = Vec::new();
        let mut poller_map: HashMap<&'static str, PollerHandle> = HashMap::new();

        // Social poller.
        let social_token = secret(&config.social.token_env, &credentials, "social");
        let social_provider = HttpSocialProvider::new(&config.social.base_url, social_token)
            .map_err(|e| AppError::Init(format!("social provider: {e}")))?;
        let social_poller = SocialPoller::new(
            social_provider,
            SocialConfig {
                handles: config.social.handles.clone(),
                high_value: config.social.high_value.clone(),
                engagement_threshold: config.social.engagement_threshold,
            },
            sentiment.clone(),
        );
        let (handle, join) = spawn_poller(
            social_poller,
            PollerRuntimeConfig {
                interval: Duration::from_secs(config.intervals.social_secs),
                backoff_cap: config.intervals.backoff_cap,
                start_stopped: config.social.handles.is_empty(),
            },
            snapshot.clone(),
            drafts_tx.clone(),
        );
        poller_map.insert(handle.name(), handle.clone());
        poller_handles.push(handle);
        poller_joins.push(join);

        // News poller.
        let news_key = secret(&config.news.api_key_env, &credentials, "news");
        let news_provider = HttpNewsProvider::new(&config.news.base_url, news_key)
            .map_err(|e| AppError::Init(format!("news provider: {e}")))?;
        let news_poller = NewsPoller::new(
            news_provider,
            NewsConfig {
                categories: config.news.categories.clone(),
                language: config.news.language.clone(),
            },
        );
        let (handle, join) = spawn_poller(
            news_poller,
            PollerRuntimeConfig {
                interval: Duration::from_secs(config.intervals.news_secs),
                backoff_cap: config.intervals.backoff_cap,
                start_stopped: false,
            },
            snapshot.clone(),
            drafts_tx.clone(),
        );
        poller_map.insert(handle.name(), handle.clone());
        poller_handles.push(handle);
        poller_joins.push(join);

        // Technical signal generator.
        let signal_generator = SignalGenerator::new(
            market.clone(),
            SignalConfig {
                symbols: config.signals.symbols.clone(),
                sentiment_min: config.signals.sentiment_min,
                ..Default::default()
            },
            sentiment.clone(),
        );
        let (handle, join) = spawn_poller(
            signal_generator,
            PollerRuntimeConfig {
                interval: Duration::from_secs(config.intervals.signals_secs),
                backoff_cap: config.intervals.backoff_cap,
                start_stopped: false,
            },
            snapshot.clone(),
            drafts_tx.clone(),
        );
        poller_map.insert(handle.name(), handle.clone());
        poller_handles.push(handle);
        poller_joins.push(join);

        // Price-update poller.
        let (handle, join) = spawn_price_poller(
            market.clone(),
            trading.clone(),
            positions.clone(),
            price_bus.clone(),
            PricePollerConfig {
                interval: Duration::from_secs(config.intervals.price_secs),
            },
            snapshot.clone(),
            drafts_tx.clone(),
        );
        poller_map.insert(handle.name(), handle.clone());
        poller_handles.push(handle);
        poller_joins.push(join);

        // Alert engine.
        let engine = AlertEngine::new(
            alerts.clone(),
            market.clone(),
            AlertEngineConfig {
                interval: Duration::from_secs(config.intervals.alerts_secs),
                emergency_band_pct: config.alerts.emergency_band_pct,
                rearm_after_secs: config.alerts.rearm_after_secs,
                ..Default::default()
            },
        );
        background.push(tokio::spawn(argus_alerts::run_alert_engine(
            engine,
            drafts_tx.clone(),
        )));

        // Threat detector.
        background.push(tokio::spawn(run_threat_detector(
            price_bus.subscribe(),
            positions.clone(),
            drafts_tx.clone(),
            ThreatConfig {
                critical_dsl_pct: config.threat.critical_dsl_pct,
                high_dsl_pct: config.threat.high_dsl_pct,
                critical_velocity_pct: config.threat.critical_velocity_pct,
                high_velocity_pct: config.threat.high_velocity_pct,
                hysteresis: Duration::from_secs(config.threat.hysteresis_secs),
                ..Default::default()
            },
        )));

        // Gateway.
        let app_state = AppState {
            store: store.clone(),
            enricher,
            alerts,
            tts,
            trading,
            market,
            positions,
            price_bus,
            pollers: Arc::new(poller_map),
            config: GatewayConfig {
                port: config.port,
                cors_origins: config.cors_origins.clone(),
                fanout: FanoutConfig {
                    queue: QueueConfig {
                        visual_duration: Duration::from_secs(config.presentation.visual_secs),
                        cooldowns: config.presentation.cooldowns(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                ..Default::default()
            },
            started_at: Instant::now(),
        };
        background.push(tokio::spawn(async move {
            if let Err(e) = argus_gateway::run_server(app_state).await {
                warn!(error = %e, "Gateway server exited");
            }
        }));

        info!(pollers = poller_handles.len(), "Application assembled");
        Ok(Self {
            store,
            poller_handles,
            poller_joins,
            drafts_tx: Some(drafts_tx),
            enrich_join,
            store_join,
            background,
        })
    }

    /// Run until ctrl-c, then shut down gracefully.
    pub async fn run(mut self) -> AppResult<()> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| AppError::Init(format!("signal handler: {e}")))?;
        info!("Shutdown signal received");
        self.shutdown().await;
        Ok(())
    }

    /// Graceful shutdown: pollers flush snapshots, enrichment drains,
    /// the store exits last. Each stage is bounded by the deadline.
    pub async fn shutdown(&mut self) {
        for handle in &self.poller_handles {
            handle.shutdown().await;
        }
        for join in self.poller_joins.drain(..) {
            if tokio::time::timeout(SHUTDOWN_DEADLINE, join).await.is_err() {
                warn!("Poller shutdown timed out");
            }
        }

        // Stop the remaining producers so the draft channel can close.
        for task in self.background.drain(..) {
            task.abort();
        }

        // Closing the last sender lets the enrichment worker drain.
        self.drafts_tx.take();
        if tokio::time::timeout(SHUTDOWN_DEADLINE, &mut self.enrich_join)
            .await
            .is_err()
        {
            warn!("Enrichment drain timed out");
            self.enrich_join.abort();
        }

        self.store.shutdown().await;
        if tokio::time::timeout(SHUTDOWN_DEADLINE, &mut self.store_join)
            .await
            .is_err()
        {
            warn!("Store shutdown timed out");
            self.store_join.abort();
        }

        info!("Shutdown complete");
    }
}
