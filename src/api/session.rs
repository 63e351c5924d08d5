//! Session management.

use actix_web::{
    FromRequest,
    HttpRequest,
    HttpResponse,
    middleware::{Middleware, Started, Response},
    error::{ErrorInternalServerError, Result},
    http::Cookie,
};
use chrono::{Duration, Utc};
use diesel::{prelude::*, result::Error as DbError};
use std::{marker::PhantomData, rc::Rc};

use crate::{
    audit::{self, Actor},
    db::{
        Connection,
        Pool,
        models::{Session as DbSession, NewSession},
        schema::sessions,
    },
    models::user::{FindUserError, User},
    permissions::{Permission, PermissionBits, RequirePermissionsError},
    utils,
};
use super::{Error, State};

/// Name of the cookie carrying session ID.
const COOKIE: &str = "sesid";

/// Maximal age of a session, after which user will be required to
/// re-authenticate. Defaults to 30 days.
const MAX_DURATION: i64 = 30;

/// Time which must pass for session to be considered expired due to inactivity,
/// defaults to seven days.
const INACTIVITY_EXPIRATION: i64 = 7;

pub struct SessionManager {
    /// Secret key used to seal and unseal session cookies.
    secret: Vec<u8>,
    /// Pool of database connections.
    db: Pool,
    /// Only send the session cookie over HTTPS.
    secure: bool,
}

/// Session extractor.
///
/// Extract session data from request or reject it. Requests can be rejected
/// when there is no valid session (401), or by the [`Policy`] chosen (403).
pub struct Session<Policy = Normal> {
    data: Rc<SessionInfo>,
    _policy: PhantomData<Policy>,
}

/// A validated session, together with its owner.
#[derive(Debug)]
pub struct SessionInfo {
    pub session: DbSession,
    pub user: User,
    /// Permissions the owner holds at the time of this request.
    pub permissions: PermissionBits,
}

/// Policies govern what sessions can do. For example a [`Normal`] session can
/// be used by any signed-in user, while a `Session<AddSchool>` can only be
/// obtained by users allowed to create schools.
///
/// When implementing a policy you can assume the session itself is valid,
/// as policies are only checked after a session was validated.
pub trait Policy {
    type Error;

    /// Validate a session.
    fn validate(session: &SessionInfo) -> Validation<Self::Error>;
}

/// Outcome of policy validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Validation<E = Error> {
    /// Let this session through.
    Pass,
    /// Reject this session.
    Reject,
    /// Reject this session with a specific error.
    Error(E),
}

/// Normal policy.
///
/// This policy allows all sessions to pass.
///
/// This is the default policy.
pub struct Normal;

/// Staff policy.
///
/// This policy only allows staff members and superusers.
pub struct Staff;

pub type StaffSession = Session<Staff>;

/// Data internal to the session manager.
struct SessionData {
    /// Existing session, if any.
    existing: Option<Rc<SessionInfo>>,
    /// Data for a new session to be created.
    new: Option<NewSession>,
    /// Whether to destroy the existing session or not. Existing session
    /// is always destroyed if it is to be replaced with a new one.
    destroy: bool,
}

impl SessionManager {
    pub fn new(secret: Vec<u8>, db: Pool, secure: bool) -> SessionManager {
        SessionManager { secret, db, secure }
    }

    fn validate(ses: &DbSession) -> bool {
        let now = Utc::now().naive_utc();

        // Disallow expired sessions.
        if now > ses.expires {
            return false;
        }

        // Disallow reviving inactive sessions.
        now - ses.last_used <= Duration::days(INACTIVITY_EXPIRATION)
    }

    /// Load session with given ID, together with its owner.
    ///
    /// Invalid sessions, and sessions of users who can no longer sign in, are
    /// deleted.
    fn load(dbcon: &Connection, sesid: i32)
    -> Result<Option<SessionInfo>, DbError> {
        let session = sessions::table
            .filter(sessions::id.eq(sesid))
            .get_result::<DbSession>(dbcon)
            .optional()?;

        let session = match session {
            Some(session) => session,
            None => return Ok(None),
        };

        if !SessionManager::validate(&session) {
            diesel::delete(&session).execute(dbcon)?;
            return Ok(None);
        }

        let user = match User::by_id(dbcon, session.user) {
            Ok(user) => user,
            Err(FindUserError::NotFound) => return Ok(None),
            Err(FindUserError::Internal(err)) => return Err(err),
        };

        if !user.is_active {
            diesel::delete(&session).execute(dbcon)?;
            return Ok(None);
        }

        let permissions = user.permissions(dbcon)?;

        Ok(Some(SessionInfo { session, user, permissions }))
    }

    fn cookie_id(&self, value: &str) -> Option<i32> {
        let mut data = base64::decode(value).ok()?;
        utils::unseal(&self.secret, &mut data).ok()
    }
}

impl<S> Middleware<S> for SessionManager {
    fn start(&self, req: &HttpRequest<S>) -> Result<Started> {
        let sesid = match req.cookie(COOKIE)
            .and_then(|cookie| self.cookie_id(cookie.value())) {
            Some(sesid) => sesid,
            None => return Ok(Started::Done),
        };

        let db = self.db.get()
            .map_err(|e| ErrorInternalServerError(e.to_string()))?;

        let info = SessionManager::load(&*db, sesid)
            .map_err(|e| ErrorInternalServerError(e.to_string()))?;

        if let Some(info) = info {
            audit::set_actor(Actor::User(info.user.id));

            req.extensions_mut().insert(SessionData {
                existing: Some(Rc::new(info)),
                new: None,
                destroy: false,
            });
        }

        Ok(Started::Done)
    }

    fn response(&self, req: &HttpRequest<S>, mut rsp: HttpResponse) -> Result<Response> {
        audit::set_actor(None::<Actor>);

        let extensions = req.extensions();
        let session = match extensions.get::<SessionData>() {
            Some(session) => session,
            None => return Ok(Response::Done(rsp)),
        };

        let now = Utc::now().naive_utc();
        let db = self.db.get()
            .map_err(|e| ErrorInternalServerError(e.to_string()))?;

        if let Some(new) = session.new {
            if let Some(ref info) = session.existing {
                diesel::delete(&info.session)
                    .execute(&*db)
                    .map_err(|e| ErrorInternalServerError(e.to_string()))?;
            }

            let created = diesel::insert_into(sessions::table)
                .values(new)
                .get_result::<DbSession>(&*db)
                .map_err(|e| ErrorInternalServerError(e.to_string()))?;

            let value = utils::seal(&self.secret, created.id)
                .map_err(|e| ErrorInternalServerError(e.to_string()))?;
            let cookie = Cookie::build(COOKIE, base64::encode(&value))
                .path("/")
                .max_age(Duration::days(MAX_DURATION))
                .secure(self.secure)
                .http_only(true)
                .finish();
            rsp.add_cookie(&cookie)?;
        } else if let Some(ref info) = session.existing {
            if session.destroy {
                diesel::delete(&info.session)
                    .execute(&*db)
                    .map_err(|e| ErrorInternalServerError(e.to_string()))?;

                let cookie = Cookie::build(COOKIE, "")
                    .path("/")
                    .max_age(Duration::zero())
                    .secure(self.secure)
                    .http_only(true)
                    .finish();
                rsp.add_cookie(&cookie)?;
            } else {
                diesel::update(&info.session)
                    .set(sessions::last_used.eq(now))
                    .execute(&*db)
                    .map_err(|e| ErrorInternalServerError(e.to_string()))?;
            }
        }

        Ok(Response::Done(rsp))
    }
}

impl Session {
    /// Start a new session for `user`, replacing the current one, if any.
    ///
    /// The session is stored and its cookie set once the response is ready.
    pub fn create<S>(req: &HttpRequest<S>, user: &User) {
        let now = Utc::now().naive_utc();
        let new = NewSession {
            user: user.id,
            expires: now + Duration::days(MAX_DURATION),
            last_used: now,
        };

        let mut extensions = req.extensions_mut();

        if let Some(session) = extensions.get_mut::<SessionData>() {
            session.new = Some(new);
            return;
        }

        extensions.insert(SessionData {
            existing: None,
            new: Some(new),
            destroy: false,
        });
    }
}

impl<P> Session<P> {
    /// End this session.
    pub fn destroy<S>(req: &HttpRequest<S>, sess: Self) {
        req.extensions_mut().insert(SessionData {
            existing: Some(sess.data),
            new: None,
            destroy: true,
        })
    }

    /// User owning this session.
    pub fn user(&self) -> &User {
        &self.data.user
    }

    /// Permissions the owner of this session holds.
    pub fn permissions(&self) -> PermissionBits {
        self.data.permissions
    }
}

impl<P> std::ops::Deref for Session<P> {
    type Target = DbSession;

    fn deref(&self) -> &DbSession {
        &self.data.session
    }
}

impl<P> FromRequest<State> for Session<P>
where
    P: Policy,
    Error: From<P::Error>,
{
    type Config = ();
    type Result = Result<Session<P>, Error>;

    fn from_request(req: &HttpRequest<State>, _cfg: &()) -> Self::Result {
        let data = req.extensions()
            .get::<SessionData>()
            .filter(|s| !s.destroy)
            .and_then(|s| s.existing.clone())
            .ok_or(SessionFromRequestError::Required)?;

        match P::validate(&data) {
            Validation::Pass => (),
            Validation::Reject =>
                return Err(SessionFromRequestError::Policy.into()),
            Validation::Error(error) => return Err(error.into()),
        }

        Ok(Session {
            data,
            _policy: PhantomData,
        })
    }
}

impl Policy for Normal {
    type Error = Error;

    fn validate(_: &SessionInfo) -> Validation {
        Validation::Pass
    }
}

impl Policy for Staff {
    type Error = Error;

    fn validate(session: &SessionInfo) -> Validation {
        if session.user.is_staff || session.user.is_superuser {
            Validation::Pass
        } else {
            Validation::Reject
        }
    }
}

impl<P: Permission> Policy for P {
    type Error = RequirePermissionsError;

    fn validate(session: &SessionInfo) -> Validation<RequirePermissionsError> {
        match session.permissions.require(P::bits()) {
            Ok(()) => Validation::Pass,
            Err(err) => Validation::Error(err),
        }
    }
}

#[derive(ApiError, Debug, Fail)]
pub enum SessionFromRequestError {
    /// There is no session.
    #[fail(display = "A session is required")]
    #[api(code = "user:session:required", status = "UNAUTHORIZED")]
    Required,
    /// Session was rejected by policy.
    #[fail(display = "Session rejected by policy")]
    #[api(code = "user:session:rejected", status = "FORBIDDEN")]
    Policy,
}
