use chrono::{NaiveDate, NaiveDateTime};

use super::{schema::*, types::*};

#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct Role {
    pub id: i32,
    /// Machine name, e.g. `student`.
    pub name: String,
    /// Name shown to humans, e.g. `Student`.
    pub display_name: String,
    pub description: String,
    /// Do users holding this role have access to staff pages?
    pub is_staff_role: bool,
    /// Is this role assigned to newly created users? At most one role can be
    /// the default.
    pub is_default_role: bool,
    /// Bit-flags of [`crate::permissions::PermissionBits`].
    pub permissions: i32,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "roles"]
pub struct NewRole<'a> {
    pub name: &'a str,
    pub display_name: &'a str,
    pub description: &'a str,
    pub is_staff_role: bool,
    pub is_default_role: bool,
    pub permissions: i32,
}

#[derive(AsChangeset, Clone, Copy, Debug, Default)]
#[table_name = "roles"]
pub struct RoleChange<'a> {
    pub display_name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub is_staff_role: Option<bool>,
    pub is_default_role: Option<bool>,
}

#[derive(Associations, Clone, Debug, Identifiable, Queryable)]
#[belongs_to(Role, foreign_key = "role")]
pub struct User {
    pub id: i32,
    /// Name used to sign in.
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Hash of password, currently Argon2.
    pub password: Vec<u8>,
    /// Salt used for hashing password.
    pub salt: Vec<u8>,
    /// Superusers have all permissions and are always staff.
    pub is_superuser: bool,
    /// Can this user access staff pages?
    pub is_staff: bool,
    /// Inactive users can't sign in.
    pub is_active: bool,
    pub role: Option<i32>,
    pub date_joined: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "users"]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password: &'a [u8],
    pub salt: &'a [u8],
    pub is_superuser: bool,
    pub is_staff: bool,
    pub role: Option<i32>,
}

#[derive(AsChangeset, Clone, Copy, Debug)]
#[table_name = "users"]
pub struct PasswordChange<'a> {
    pub password: &'a [u8],
    pub salt: &'a [u8],
}

#[derive(Associations, Clone, Copy, Debug, Identifiable, Queryable)]
#[belongs_to(User, foreign_key = "user")]
pub struct Session {
    /// ID of this session.
    pub id: i32,
    /// ID of the user owning this session.
    pub user: i32,
    /// Maximum age for the session, after which it must not be used.
    pub expires: NaiveDateTime,
    /// Date of the last use of a session. Sessions which were not used for some
    /// time should expire, even if they are still valid according to `expires`.
    pub last_used: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "sessions"]
pub struct NewSession {
    pub user: i32,
    pub expires: NaiveDateTime,
    pub last_used: NaiveDateTime,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
#[table_name = "audit_log"]
pub struct AuditLog {
    pub id: i32,
    pub timestamp: NaiveDateTime,
    pub actor: Option<i32>,
    pub context: String,
    pub context_id: Option<i32>,
    pub kind: String,
    /// MessagePack encoded data.
    pub data: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "audit_log"]
pub struct NewAuditLog<'a> {
    pub actor: Option<i32>,
    pub context: &'a str,
    pub context_id: Option<i32>,
    pub kind: &'a str,
    pub data: &'a [u8],
}

#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct School {
    pub id: i32,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "schools"]
pub struct NewSchool<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

#[derive(AsChangeset, Clone, Copy, Debug, Default)]
#[table_name = "schools"]
pub struct SchoolChange<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
}

#[derive(Associations, Clone, Debug, Identifiable, Queryable)]
#[belongs_to(School, foreign_key = "school")]
pub struct Module {
    pub id: i32,
    pub school: i32,
    pub title: String,
    pub description: String,
    /// Position of this module within its school, starting at 1.
    pub position: i32,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "modules"]
pub struct NewModule<'a> {
    pub school: i32,
    pub title: &'a str,
    pub description: &'a str,
    pub position: i32,
}

#[derive(AsChangeset, Clone, Copy, Debug, Default)]
#[table_name = "modules"]
pub struct ModuleChange<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub position: Option<i32>,
}

#[derive(Associations, Clone, Debug, Identifiable, Queryable)]
#[belongs_to(User, foreign_key = "student")]
#[belongs_to(Module, foreign_key = "module")]
pub struct Enrollment {
    pub id: i32,
    pub student: i32,
    pub module: i32,
    pub date_enrolled: NaiveDate,
    pub completed: bool,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "enrollments"]
pub struct NewEnrollment {
    pub student: i32,
    pub module: i32,
    pub completed: bool,
}

#[derive(Clone, Debug, Queryable)]
pub struct OrgDetail {
    pub name: OrgDetailKind,
    pub value: String,
}

#[derive(Clone, Debug, Queryable)]
pub struct OrgImage {
    pub name: OrgImageKind,
    pub path: String,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
#[table_name = "social_media_links"]
pub struct SocialMediaLink {
    pub id: i32,
    pub name: SocialPlatform,
    pub url: String,
    pub is_active: bool,
    pub position: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "social_media_links"]
pub struct NewSocialMediaLink<'a> {
    pub name: SocialPlatform,
    pub url: &'a str,
    pub is_active: bool,
    pub position: i32,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
pub struct PhoneNumber {
    pub id: i32,
    /// Number in E.164 format.
    pub number: String,
    pub is_active: bool,
    pub is_primary: bool,
    pub use_for_whatsapp: bool,
    pub position: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "phone_numbers"]
pub struct NewPhoneNumber<'a> {
    pub number: &'a str,
    pub is_active: bool,
    pub is_primary: bool,
    pub use_for_whatsapp: bool,
    pub position: i32,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
#[table_name = "email_addresses"]
pub struct EmailAddress {
    pub id: i32,
    pub email: String,
    pub is_active: bool,
    pub is_primary: bool,
    pub position: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "email_addresses"]
pub struct NewEmailAddress<'a> {
    pub email: &'a str,
    pub is_active: bool,
    pub is_primary: bool,
    pub position: i32,
}

#[derive(Clone, Debug, Identifiable, Queryable)]
#[table_name = "physical_addresses"]
pub struct PhysicalAddress {
    pub id: i32,
    pub label: String,
    pub building: String,
    pub street_address: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    pub country: String,
    /// URL of a map to embed in an iframe.
    pub map_embed_url: String,
    pub is_active: bool,
    /// Is this the address shown next to the contact form? At most one
    /// address can be.
    pub use_in_contact_form: bool,
    pub position: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Insertable)]
#[table_name = "physical_addresses"]
pub struct NewPhysicalAddress<'a> {
    pub label: &'a str,
    pub building: &'a str,
    pub street_address: &'a str,
    pub city: &'a str,
    pub state_province: &'a str,
    pub postal_code: &'a str,
    pub country: &'a str,
    pub map_embed_url: &'a str,
    pub is_active: bool,
    pub use_in_contact_form: bool,
    pub position: i32,
}
