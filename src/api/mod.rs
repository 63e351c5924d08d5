use actix::System;
use actix_web::{
    App,
    fs::StaticFiles,
    middleware::Logger,
    server,
};
use sentry_actix::SentryMiddleware;
use std::{path::Path, sync::Arc};

use super::{
    Result,
    config::Config,
    db,
    registry::Registries,
    site::SiteCache,
};

pub use self::error::{ApiError, Error};

pub(self) use self::error::{RouteExt, RouterExt};

pub mod dashboard;
pub mod enrollments;
pub mod error;
pub mod flash;
pub mod hosts;
pub mod modules;
pub mod pages;
pub mod roles;
pub mod schools;
pub mod session;
pub mod site;
pub mod users;
pub mod util;

/// Start an API server.
pub fn start(cfg: &Config) -> Result<()> {
    let system = System::new("gci-schools");
    let state = configure(cfg.clone())?;
    let server = server::new(move || vec![
        new_app(state.clone()),
        files_app(state.clone()),
        pages::app(state.clone()),
    ]);

    let server = if let Some(fd) = listenfd::ListenFd::from_env().take_tcp_listener(0)? {
        server.listen(fd)
    } else {
        server.bind(cfg.server.address)?
    };

    info!("Listening on {}", cfg.server.address);

    server
        .server_hostname(cfg.server.domain.clone())
        .start();

    system.run();

    Ok(())
}

#[derive(Clone)]
pub struct State {
    /// Current configuration.
    pub config: Config,
    /// Database connection pool.
    pub db: db::Pool,
    /// Navigation, authentication pages, and home URL.
    pub registries: Arc<Registries>,
    /// Information about the organisation running this site.
    pub site: SiteCache,
}

pub fn configure(cfg: Config) -> Result<State> {
    let db = db::pool(&cfg)?;
    let registries = Arc::new(Registries::new(&cfg)?);
    let site = SiteCache::new(cfg.server.environment);

    Ok(State {
        config: cfg,
        db,
        registries,
        site,
    })
}

/// Middleware every application shares.
fn base_app(state: State) -> App<State> {
    let hosts = hosts::AllowedHosts::new(&state.config.server.allowed_hosts);
    let sessions = session::SessionManager::new(
        state.config.server.secret.clone(),
        state.db.clone(),
        !state.config.is_debug(),
    );

    App::with_state(state)
        .middleware(SentryMiddleware::new())
        .middleware(Logger::default())
        .middleware(hosts)
        .middleware(sessions)
}

pub fn new_app(state: State) -> App<State> {
    base_app(state)
        .prefix("/api/v1")
        .configure(enrollments::routes)
        .configure(modules::routes)
        .configure(roles::routes)
        .configure(schools::routes)
        .configure(site::routes)
        .configure(users::routes)
}

/// Static and media files.
///
/// These are only served by this process in development, production
/// deployments are expected to have them served by a proxy.
pub fn files_app(state: State) -> App<State> {
    let debug = state.config.is_debug();
    let static_dir = state.config.server.static_dir.clone();
    let media_dir = state.config.server.media_dir.clone();
    let app = App::with_state(state).prefix("/lib");

    if !debug {
        return app;
    }

    let app = match serve_dir(&static_dir) {
        Some(files) => app.handler("/static", files),
        None => app,
    };

    match serve_dir(&media_dir) {
        Some(files) => app.handler("/media", files),
        None => app,
    }
}

fn serve_dir(path: &Path) -> Option<StaticFiles<State>> {
    match StaticFiles::new(path) {
        Ok(files) => Some(files),
        Err(err) => {
            warn!("Not serving {}: {}", path.display(), err);
            None
        }
    }
}
