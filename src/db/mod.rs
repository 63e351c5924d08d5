use diesel::pg::PgConnection;
use r2d2_diesel::ConnectionManager;
use std::env;
use url::Url;

use crate::{config, utils::SingleInit};
use super::Config;

pub mod models;
pub mod schema;
pub mod types;

pub type Connection = PgConnection;

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Find the correct database URL based on configuration and environment.
pub fn database_url(cfg: &Config) -> Result<String, GetDatabaseUrlError> {
    match env::var("DATABASE_URL") {
        Ok(url) => return Ok(url),
        Err(env::VarError::NotUnicode(_)) => {
            return Err(GetDatabaseUrlError::VarInvalidUnicode);
        }
        Err(env::VarError::NotPresent) => (),
    }

    if let Some(ref url) = cfg.database.url {
        return Ok(url.clone());
    }

    if cfg.database.is_composed() {
        return compose_url(&cfg.database);
    }

    Err(GetDatabaseUrlError::NotConfigured)
}

/// Build a libpq connection URI from individual settings.
fn compose_url(db: &config::Database) -> Result<String, GetDatabaseUrlError> {
    let mut url = Url::parse("postgres://localhost")
        .map_err(|_| GetDatabaseUrlError::InvalidPart("host"))?;

    url.set_host(Some(db.host.as_ref().map_or("localhost", String::as_str)))
        .map_err(|_| GetDatabaseUrlError::InvalidPart("DB_HOST"))?;
    url.set_port(Some(db.port.unwrap_or(5432)))
        .map_err(|_| GetDatabaseUrlError::InvalidPart("DB_PORT"))?;

    if let Some(ref user) = db.user {
        url.set_username(user)
            .map_err(|_| GetDatabaseUrlError::InvalidPart("DB_USER"))?;
    }

    if let Some(ref password) = db.password {
        url.set_password(Some(password))
            .map_err(|_| GetDatabaseUrlError::InvalidPart("DB_PASSWORD"))?;
    }

    if let Some(ref name) = db.name {
        url.set_path(&format!("/{}", name));
    }

    if db.service.is_some() || db.passfile.is_some() {
        let mut query = url.query_pairs_mut();
        if let Some(ref service) = db.service {
            query.append_pair("service", service);
        }
        if let Some(ref passfile) = db.passfile {
            query.append_pair("passfile", passfile);
        }
    }

    Ok(url.into_string())
}

#[derive(Debug, Fail)]
pub enum GetDatabaseUrlError {
    #[fail(display = "No database connection configured. Set DATABASE_URL, \
        [database].url, or DB_POSTGRESQL with DB_* settings")]
    NotConfigured,
    #[fail(display = "DATABASE_URL contains invalid Unicode")]
    VarInvalidUnicode,
    #[fail(display = "Invalid database setting {}", _0)]
    InvalidPart(&'static str),
}

/// Create a new connection.
pub fn connect(cfg: &Config) -> crate::Result<Connection> {
    use diesel::Connection;

    let url = database_url(cfg)?;
    let conn = PgConnection::establish(&url)?;

    Ok(conn)
}

static POOL: SingleInit<Pool> = SingleInit::uninit();

/// Create a connection pool for the database.
///
/// Note that this function will only ever create a single pool. If it has
/// succeeded once, every call after that will return the same pool.
pub fn pool(cfg: &Config) -> crate::Result<Pool> {
    POOL.get_or_try_init(|| -> crate::Result<Pool> {
        let url = database_url(cfg)?;
        let manager = ConnectionManager::new(url);
        let pool = Pool::new(manager)?;

        // Try to connect to database to detect errors early.
        let conn = pool.get()?;

        // Run migrations in production build.
        if cfg!(not(debug_assertions)) {
            migrate(&*conn)?;
        }

        Ok(pool)
    }).map(Clone::clone)
}

embed_migrations!();

/// Run all pending migrations and then make sure the data every deployment
/// expects is present.
pub fn migrate(dbcon: &Connection) -> crate::Result<()> {
    embedded_migrations::run_with_output(dbcon, &mut std::io::stderr())
        .map_err(|e| format_err!("Migrations failed: {}", e))?;

    crate::models::post_migrate(dbcon)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_url_from_parts() {
        let db = config::Database {
            postgresql: true,
            name: Some("gci".into()),
            user: Some("gci".into()),
            password: Some("p@ss word".into()),
            host: Some("db.internal".into()),
            port: Some(6543),
            .. config::Database::default()
        };

        let url = Url::parse(&compose_url(&db).unwrap()).unwrap();
        assert_eq!(url.scheme(), "postgres");
        assert_eq!(url.username(), "gci");
        assert_eq!(url.password(), Some("p%40ss%20word"));
        assert_eq!(url.host_str(), Some("db.internal"));
        assert_eq!(url.port(), Some(6543));
        assert_eq!(url.path(), "/gci");
    }

    #[test]
    fn composes_url_with_service_and_passfile() {
        let db = config::Database {
            postgresql: true,
            service: Some("gci".into()),
            passfile: Some("/etc/gci/.pgpass".into()),
            .. config::Database::default()
        };

        let url = Url::parse(&compose_url(&db).unwrap()).unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(5432));

        let query = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(query, vec![
            ("service".to_string(), "gci".to_string()),
            ("passfile".to_string(), "/etc/gci/.pgpass".to_string()),
        ]);
    }
}
