use diesel::{prelude::*, result::Error as DbError};
use futures::{task_local, task::is_in_task};
use serde::Serialize;
use std::cell::Cell;

use crate::db::{
    Connection,
    models as db,
    schema::audit_log,
};

std::thread_local! {
    static THREAD_ACTOR: Cell<Option<Actor>> = Cell::new(None);
}

task_local! {
    static ACTOR: Cell<Option<Actor>> = Cell::new(None)
}

/// Entity responsible for an action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Actor {
    /// System. This actor is used for actions carried automatically by the
    /// system, and actions invoked from the CLI.
    System,
    /// A user.
    User(i32),
}

impl Actor {
    fn as_db(self) -> Option<i32> {
        match self {
            Actor::System => None,
            Actor::User(id) => Some(id),
        }
    }
}

impl From<i32> for Actor {
    fn from(id: i32) -> Self {
        Actor::User(id)
    }
}

/// Set actor associated with current task/thread, returning previous one, if
/// any.
pub fn set_actor<A>(actor: A) -> Option<Actor>
where
    Option<Actor>: From<A>,
{
    let actor = Option::from(actor);
    if is_in_task() {
        ACTOR.with(|c| c.replace(actor))
    } else {
        THREAD_ACTOR.with(|c| c.replace(actor))
    }
}

/// Get actor associated with current task/thread.
///
/// Actions taken outside of any registered actor are attributed to
/// [`Actor::System`].
pub fn get_actor() -> Actor {
    if is_in_task() {
        ACTOR.with(Cell::get)
    } else {
        THREAD_ACTOR.with(Cell::get)
    }.unwrap_or(Actor::System)
}

/// Run closure in such context that all actions it causes are attributed to the
/// specified actor.
pub fn with_actor<A, F, R>(actor: A, f: F) -> R
where
    Option<Actor>: From<A>,
    F: FnOnce() -> R,
{
    let old = set_actor(actor);
    let r = f();
    set_actor::<Option<Actor>>(old);
    r
}

/// Store an event in the audit log, attributing it to the current actor.
///
/// When used inside a database transaction the entry is only stored if the
/// transaction is committed. Failure to encode `data` is reported as
/// [`DbError::SerializationError`].
pub fn log_db<D>(
    db: &Connection,
    context: &str,
    context_id: i32,
    kind: &str,
    data: D,
) -> Result<(), DbError>
where
    D: Serialize,
{
    log_db_actor(db, get_actor(), context, Some(context_id), kind, data)
}

/// Store an event in the audit log.
pub fn log_db_actor<A, D>(
    db: &Connection,
    actor: A,
    context: &str,
    context_id: Option<i32>,
    kind: &str,
    data: D,
) -> Result<(), DbError>
where
    Actor: From<A>,
    D: Serialize,
{
    let actor = Actor::from(actor).as_db();
    let data = rmps::to_vec_named(&data)
        .map_err(|e| DbError::SerializationError(Box::new(e)))?;

    diesel::insert_into(audit_log::table)
        .values(db::NewAuditLog {
            actor,
            context,
            context_id,
            kind,
            data: &data,
        })
        .execute(db)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_defaults_to_system() {
        set_actor::<Option<Actor>>(None);
        assert_eq!(get_actor(), Actor::System);
    }

    #[test]
    fn with_actor_restores_previous() {
        set_actor(Actor::User(3));
        let inner = with_actor(Actor::User(7), get_actor);
        assert_eq!(inner, Actor::User(7));
        assert_eq!(get_actor(), Actor::User(3));
        set_actor::<Option<Actor>>(None);
    }
}
