//! Landing page of the schools application for signed-in users.

use actix_web::{App, HttpRequest, HttpResponse};

use crate::{
    layout::Page,
    models::{
        Enrollment,
        School,
        enrollment::{self, STUDENT_ROLE},
        module,
        school,
    },
};
use super::{
    Error,
    RouteExt,
    State,
    session::Session,
    util::redirect,
};

/// Configure routes.
pub fn routes(app: App<State>, prefix: &str) -> App<State> {
    app
        .resource(prefix, |r| {
            r.get().api_with(get_dashboard);
        })
}

#[derive(Debug, Serialize)]
struct EnrolledModule {
    enrollment: enrollment::PublicData,
    module: module::PublicData,
    name: String,
}

#[derive(Debug, Serialize)]
struct SchoolModules {
    school: school::PublicData,
    modules: Vec<module::PublicData>,
}

#[derive(Debug, Default, Serialize)]
struct DashboardTemplate {
    is_student: bool,
    enrollments: Vec<EnrolledModule>,
    schools: Vec<SchoolModules>,
}

/// Render the dashboard.
///
/// Students see modules they are enrolled in, staff see all schools with
/// their modules.
///
/// ## Method
///
/// ```text
/// GET /dashboard/
/// ```
pub fn get_dashboard(req: HttpRequest<State>, session: Option<Session>)
-> Result<HttpResponse, Error> {
    let session = match session {
        Some(session) => session,
        None => {
            let prefix = req.state().config.apps.url_prefix();
            return Ok(redirect(&format!("/signin/?next={}", prefix)));
        }
    };

    let db = req.state().db.get()?;
    let user = session.user();
    let mut data = DashboardTemplate::default();

    if user.has_role(&*db, STUDENT_ROLE)? {
        data.is_student = true;

        for (enrollment, module) in Enrollment::of_student(&*db, user)? {
            let school = module.school(&*db)?;

            data.enrollments.push(EnrolledModule {
                name: module.display_name(&school),
                enrollment: enrollment.get_public(),
                module: module.get_public(),
            });
        }
    }

    if user.is_staff || user.is_superuser {
        for school in School::all(&*db)? {
            data.schools.push(SchoolModules {
                modules: school.modules(&*db)?.iter().map(|m| m.get_public()).collect(),
                school: school.get_public(),
            });
        }
    }

    super::pages::render(&req, Some(user), &Page::new("Dashboard"),
        "dashboard.html", &data)
}
