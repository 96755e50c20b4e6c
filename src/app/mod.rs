use crate::{
    cli::RunOptions,
    clock::{Clock, IntervalTicker, LimitedTicker, SystemClock},
    config::{self, Config},
    display::{MemoryPanel, Renderer, CLOCK_REGION, TELEMETRY_REGION},
    query::{decode_rows, load_rows_file, RemoteStateClient},
    snapshot::{SnapshotCell, StatusSnapshot},
    Error, Result,
};
use chrono::Local;
use std::{path::Path, str::FromStr, sync::Arc, time::Duration};

pub mod connection;
pub mod demo;
mod lifecycle;
pub mod logger;
pub mod polling;
pub mod render_loop;

use connection::{AlwaysConnected, BackoffController, LinkFlag};
use demo::DemoClient;
use lifecycle::create_shutdown_flag;
pub use logger::{LogLevel, Logger};
use polling::{start_polling, PollContext, Poller};
use render_loop::{run_render_loop, RenderContext};

/// Settings for one run: the config file merged with CLI overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub settings: Config,
    pub rows_file: Option<String>,
    pub demo: bool,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub max_ticks: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: Config::default(),
            rows_file: None,
            demo: false,
            log_level: LogLevel::default(),
            log_file: None,
            max_ticks: None,
        }
    }
}

impl AppConfig {
    pub fn from_sources(config: Config, opts: RunOptions) -> Self {
        let settings = Config {
            bucket: opts.bucket.unwrap_or(config.bucket),
            tick_ms: opts.tick_ms.unwrap_or(config.tick_ms),
            poll_every_ticks: opts.poll_every_ticks.unwrap_or(config.poll_every_ticks),
            ..config
        };
        Self {
            settings,
            rows_file: opts.rows_file,
            demo: opts.demo,
            // Already validated by the CLI parser.
            log_level: opts
                .log_level
                .as_deref()
                .and_then(|s| LogLevel::from_str(s).ok())
                .unwrap_or_default(),
            log_file: opts.log_file,
            max_ticks: opts.max_ticks,
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.settings.tick_ms)
    }

    /// Wall time between remote queries.
    pub fn poll_interval(&self) -> Duration {
        self.tick() * self.settings.poll_every_ticks
    }
}

pub struct App {
    config: AppConfig,
    logger: Arc<Logger>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        config::validate(&config.settings)?;
        let logger = Logger::new(config.log_level, config.log_file.clone())?;
        Ok(Self {
            config,
            logger: Arc::new(logger),
        })
    }

    pub fn from_options(opts: RunOptions) -> Result<Self> {
        let cfg_file = Config::load_or_default()?;
        let merged = AppConfig::from_sources(cfg_file, opts);
        Self::new(merged)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Entry point for the binary.
    pub fn run(&self) -> Result<()> {
        let settings = &self.config.settings;
        let renderer = Renderer::new(MemoryPanel::new(
            settings.panel_width,
            settings.panel_height,
        ));

        if let Some(path) = &self.config.rows_file {
            let lines = self.render_rows_file(Path::new(path), &renderer, &SystemClock)?;
            for line in lines {
                println!("{line}");
            }
            return Ok(());
        }

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let client: Box<dyn RemoteStateClient> = if self.config.demo {
            self.logger.info("demo mode: synthetic ride and playback data");
            Box::new(DemoClient::new(clock.clone()))
        } else {
            return Err(Error::InvalidArgs(format!(
                "no query transport for {} in this build; use --demo or --rows-file",
                settings.influx_url
            )));
        };

        self.logger.info(format!(
            "start (bucket={}, tick={}, poll every {}, panel {}x{})",
            settings.bucket,
            humantime::format_duration(self.config.tick()),
            humantime::format_duration(self.config.poll_interval()),
            settings.panel_width,
            settings.panel_height
        ));

        let running = create_shutdown_flag()?;
        let cell = SnapshotCell::default();
        let link = LinkFlag::default();

        let poller = start_polling(PollContext {
            poller: Poller::new(
                client,
                &settings.bucket,
                settings.query_attempts,
                self.logger.clone(),
            ),
            cell: cell.clone(),
            renderer: renderer.clone(),
            clock: clock.clone(),
            link: link.clone(),
            ticker: IntervalTicker::new(self.config.tick(), running.clone()),
            poll_every_ticks: settings.poll_every_ticks,
            logger: self.logger.clone(),
        })?;

        let mut ctx = RenderContext {
            renderer,
            cell,
            connectivity: AlwaysConnected,
            clock,
            ticker: LimitedTicker::new(
                IntervalTicker::new(self.config.tick(), running.clone()),
                self.config.max_ticks,
            ),
            link,
            backoff: BackoffController::new(settings.backoff_initial_ms, settings.backoff_max_ms),
            poller: Some(poller.health()),
            logger: self.logger.clone(),
        };
        let result = run_render_loop(&mut ctx, &running);

        poller.stop();
        if let Err(err) = poller.join() {
            self.logger.error(format!("poller exited abnormally: {err}"));
        }
        let stats = result?;
        self.logger.info(format!(
            "shutdown after {} ticks ({} link losses)",
            stats.ticks, stats.link_losses
        ));
        if stats.poller_lost {
            return Err(Error::Io(std::io::Error::other(
                "poller thread stopped before shutdown",
            )));
        }
        Ok(())
    }

    /// Decode a rows file over an empty snapshot, draw both regions once and
    /// return the text now on the panel.
    fn render_rows_file(
        &self,
        path: &Path,
        renderer: &Renderer<MemoryPanel>,
        clock: &dyn Clock,
    ) -> Result<Vec<String>> {
        let rows = load_rows_file(path)?;
        let decoded = decode_rows(&StatusSnapshot::default(), &rows);
        for err in &decoded.errors {
            self.logger.warn(format!("rows file: {err}"));
        }
        let now = clock.now();
        renderer.render_clock(&now.with_timezone(&Local))?;
        renderer.render_telemetry(&decoded.snapshot, now)?;
        Ok(renderer.with_surface(|panel| {
            let mut lines = panel.text_in(CLOCK_REGION);
            lines.extend(panel.text_in(TELEMETRY_REGION));
            lines
        }))
    }
}
