//! Fine-grained control over actions a user can take.

use failure::Fail;
use serde::{de, ser::{self, SerializeSeq}};
use std::{fmt, marker::PhantomData};

bitflags! {
    /// Permissions allow for a fine-grained control over what actions a given
    /// user can take.
    ///
    /// Roles carry a set of permissions, and users hold the permissions of
    /// their role. Superusers hold all permissions.
    pub struct PermissionBits: i32 {
        /// All bits allocated for user management permissions.
        const MANAGE_USERS_BITS = 0x0000_000f;
        const VIEW_USER = 0x0000_0001;
        const ADD_USER = 0x0000_0002;
        const CHANGE_USER = 0x0000_0004;
        const DELETE_USER = 0x0000_0008;
        /// All bits allocated for role management permissions.
        const MANAGE_ROLES_BITS = 0x0000_00f0;
        const VIEW_ROLE = 0x0000_0010;
        const ADD_ROLE = 0x0000_0020;
        const CHANGE_ROLE = 0x0000_0040;
        const DELETE_ROLE = 0x0000_0080;
        /// All bits allocated for school management permissions.
        const MANAGE_SCHOOLS_BITS = 0x0000_0f00;
        const VIEW_SCHOOL = 0x0000_0100;
        const ADD_SCHOOL = 0x0000_0200;
        const CHANGE_SCHOOL = 0x0000_0400;
        const DELETE_SCHOOL = 0x0000_0800;
        /// All bits allocated for module management permissions.
        const MANAGE_MODULES_BITS = 0x0000_f000;
        const VIEW_MODULE = 0x0000_1000;
        const ADD_MODULE = 0x0000_2000;
        const CHANGE_MODULE = 0x0000_4000;
        const DELETE_MODULE = 0x0000_8000;
        /// All bits allocated for enrollment management permissions.
        const MANAGE_ENROLLMENTS_BITS = 0x000f_0000;
        const VIEW_ENROLLMENT = 0x0001_0000;
        const ADD_ENROLLMENT = 0x0002_0000;
        const CHANGE_ENROLLMENT = 0x0004_0000;
        const DELETE_ENROLLMENT = 0x0008_0000;
        /// Permission holder can change organisation details, images and
        /// contact information.
        const CHANGE_ORG = 0x0010_0000;
    }
}

/// A model permissions can be granted on.
struct Model {
    /// Application labels under which this model's permissions may be named.
    apps: &'static [&'static str],
    /// Model names accepted in codenames, the first one is canonical.
    names: &'static [&'static str],
    view: PermissionBits,
    add: PermissionBits,
    change: PermissionBits,
    delete: PermissionBits,
}

static MODELS: &[Model] = &[
    Model {
        apps: &["core", "home", "auth"],
        names: &["user"],
        view: PermissionBits::VIEW_USER,
        add: PermissionBits::ADD_USER,
        change: PermissionBits::CHANGE_USER,
        delete: PermissionBits::DELETE_USER,
    },
    Model {
        apps: &["core", "home", "auth"],
        names: &["role", "userrole", "usergroup"],
        view: PermissionBits::VIEW_ROLE,
        add: PermissionBits::ADD_ROLE,
        change: PermissionBits::CHANGE_ROLE,
        delete: PermissionBits::DELETE_ROLE,
    },
    Model {
        apps: &["schools"],
        names: &["school"],
        view: PermissionBits::VIEW_SCHOOL,
        add: PermissionBits::ADD_SCHOOL,
        change: PermissionBits::CHANGE_SCHOOL,
        delete: PermissionBits::DELETE_SCHOOL,
    },
    Model {
        apps: &["schools"],
        names: &["module", "unit"],
        view: PermissionBits::VIEW_MODULE,
        add: PermissionBits::ADD_MODULE,
        change: PermissionBits::CHANGE_MODULE,
        delete: PermissionBits::DELETE_MODULE,
    },
    Model {
        apps: &["schools"],
        names: &["enrollment"],
        view: PermissionBits::VIEW_ENROLLMENT,
        add: PermissionBits::ADD_ENROLLMENT,
        change: PermissionBits::CHANGE_ENROLLMENT,
        delete: PermissionBits::DELETE_ENROLLMENT,
    },
];

/// Organisation details are only ever changed, never created or deleted by
/// users.
static ORG_CODENAMES: &[&str] = &[
    "change_orgdetail",
    "change_orgimage",
    "change_org",
];

static APP_LABELS: &[&str] = &["core", "home", "auth", "schools", "base"];

impl PermissionBits {
    /// Default permissions of the built-in `student` role.
    pub fn student() -> PermissionBits {
        PermissionBits::VIEW_USER
    }

    /// Default permissions of the built-in `instructor` role.
    pub fn instructor() -> PermissionBits {
        PermissionBits::VIEW_USER
            | PermissionBits::CHANGE_USER
            | PermissionBits::VIEW_SCHOOL
            | PermissionBits::VIEW_MODULE
            | PermissionBits::CHANGE_MODULE
            | PermissionBits::VIEW_ENROLLMENT
            | PermissionBits::ADD_ENROLLMENT
            | PermissionBits::CHANGE_ENROLLMENT
    }

    /// Verify that all required permissions are present.
    ///
    /// This is the same check as `self.contains(permissions)`, but returns an
    /// [`ApiError`](crate::api::ApiError).
    pub fn require(self, permissions: PermissionBits)
    -> Result<(), RequirePermissionsError> {
        if self.contains(permissions) {
            Ok(())
        } else {
            trace!("Missing permissions: {:?}", permissions - self);
            Err(RequirePermissionsError(permissions - self))
        }
    }

    /// Parse a permission named `app.codename`, for example
    /// `schools.add_module`.
    pub fn from_codename(name: &str) -> Result<PermissionBits, ParseCodenameError> {
        let dot = name.find('.')
            .ok_or_else(|| ParseCodenameError::InvalidFormat(name.to_string()))?;
        let (app, codename) = (&name[..dot], &name[dot + 1..]);

        if app.is_empty() || codename.is_empty() {
            return Err(ParseCodenameError::InvalidFormat(name.to_string()));
        }

        if !APP_LABELS.contains(&app) {
            return Err(ParseCodenameError::NotFound(name.to_string()));
        }

        if ORG_CODENAMES.contains(&codename) && app != "schools" {
            return Ok(PermissionBits::CHANGE_ORG);
        }

        let underscore = codename.find('_')
            .ok_or_else(|| ParseCodenameError::NotFound(name.to_string()))?;
        let (action, model_name) = (&codename[..underscore], &codename[underscore + 1..]);

        let model = MODELS.iter()
            .find(|model| model.names.contains(&model_name) && model.apps.contains(&app))
            .ok_or_else(|| ParseCodenameError::NotFound(name.to_string()))?;

        match action {
            "view" => Ok(model.view),
            "add" => Ok(model.add),
            "change" => Ok(model.change),
            "delete" => Ok(model.delete),
            _ => Err(ParseCodenameError::NotFound(name.to_string())),
        }
    }

    /// Canonical codenames of all permissions in this set.
    pub fn codenames(self) -> Vec<String> {
        let mut names = Vec::new();

        for model in MODELS {
            let app = model.apps[0];
            let name = model.names[0];
            let actions = [
                ("view", model.view),
                ("add", model.add),
                ("change", model.change),
                ("delete", model.delete),
            ];

            for &(action, bits) in actions.iter() {
                if self.contains(bits) {
                    names.push(format!("{}.{}_{}", app, action, name));
                }
            }
        }

        if self.contains(PermissionBits::CHANGE_ORG) {
            names.push("home.change_orgdetail".to_string());
        }

        names
    }
}

#[derive(Debug, Fail, Eq, PartialEq)]
pub enum ParseCodenameError {
    #[fail(display = "Invalid permission format: {} (expected app.codename)", _0)]
    InvalidFormat(String),
    #[fail(display = "Permission not found: {}", _0)]
    NotFound(String),
}

#[derive(ApiError, Debug, Fail)]
#[api(status = "FORBIDDEN", code = "user:insufficient-permissions")]
#[fail(display = "Missing required permissions: {:?}", _0)]
pub struct RequirePermissionsError(pub PermissionBits);

pub trait Permission {
    /// Permissions are stored as bit-flags, and this field is a mask of bits
    /// corresponding to this permission (or combination of permissions).
    fn bits() -> PermissionBits;
}

macro_rules! permission {
    (
        $name:ident = $value:ident
    ) => {
        pub struct $name;

        impl Permission for $name {
            #[inline]
            fn bits() -> PermissionBits {
                PermissionBits::$value
            }
        }
    };
}

permission!(ViewUser = VIEW_USER);
permission!(AddUser = ADD_USER);
permission!(ChangeUser = CHANGE_USER);
permission!(DeleteUser = DELETE_USER);
permission!(ViewRole = VIEW_ROLE);
permission!(AddRole = ADD_ROLE);
permission!(ChangeRole = CHANGE_ROLE);
permission!(DeleteRole = DELETE_ROLE);
permission!(ViewSchool = VIEW_SCHOOL);
permission!(AddSchool = ADD_SCHOOL);
permission!(ChangeSchool = CHANGE_SCHOOL);
permission!(DeleteSchool = DELETE_SCHOOL);
permission!(ViewModule = VIEW_MODULE);
permission!(AddModule = ADD_MODULE);
permission!(ChangeModule = CHANGE_MODULE);
permission!(DeleteModule = DELETE_MODULE);
permission!(ViewEnrollment = VIEW_ENROLLMENT);
permission!(AddEnrollment = ADD_ENROLLMENT);
permission!(ChangeEnrollment = CHANGE_ENROLLMENT);
permission!(DeleteEnrollment = DELETE_ENROLLMENT);
permission!(ChangeOrg = CHANGE_ORG);

macro_rules! impl_permissons {
    {
        $( ($($name:ident),+) );+ $(;)*
    } => {
        $(
            impl<$($name),+> Permission for ($($name),+)
            where
                $($name: Permission,)+
            {
                #[inline]
                fn bits() -> PermissionBits {
                    $($name::bits())|+
                }
            }
        )+
    };
}

impl_permissons! {
    (A, B);
    (A, B, C);
}

impl ser::Serialize for PermissionBits {
    fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        if !ser.is_human_readable() {
            return ser.serialize_i32(self.bits());
        }

        let names = self.codenames();
        let mut seq = ser.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(&name)?;
        }
        seq.end()
    }
}

impl<'de> de::Deserialize<'de> for PermissionBits {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        if !de.is_human_readable() {
            de.deserialize_i32(BitsVisitor(PhantomData))
        } else {
            de.deserialize_any(BitsVisitor(PhantomData))
        }
    }
}

struct BitsVisitor<B>(PhantomData<B>);

impl<'de> de::Visitor<'de> for BitsVisitor<PermissionBits> {
    type Value = PermissionBits;

    fn expecting(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "a set of permissions")
    }

    fn visit_i64<E>(self, v: i64) -> Result<PermissionBits, E>
    where
        E: de::Error,
    {
        if v < std::i32::MIN.into() || v > std::i32::MAX.into() {
            return Err(E::invalid_type(
                de::Unexpected::Signed(v), &"a 32-bit integer"));
        }

        PermissionBits::from_bits(v as i32)
            .ok_or_else(|| E::invalid_value(
                de::Unexpected::Signed(v), &"a bit-flag of permissions"))
    }

    fn visit_u64<E>(self, v: u64) -> Result<PermissionBits, E>
    where
        E: de::Error,
    {
        self.visit_i64(v as i64)
    }

    fn visit_str<E>(self, v: &str) -> Result<PermissionBits, E>
    where
        E: de::Error,
    {
        PermissionBits::from_codename(v)
            .map_err(|_| E::invalid_value(
                de::Unexpected::Str(v), &"a permission name"))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<PermissionBits, A::Error>
    where
        A: de::SeqAccess<'de>,
    {
        let mut bits = PermissionBits::empty();

        while let Some(permission) = seq.next_element::<PermissionBits>()? {
            bits.insert(permission);
        }

        Ok(bits)
    }
}

impl Default for PermissionBits {
    fn default() -> Self {
        PermissionBits::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codenames() {
        assert_eq!(PermissionBits::from_codename("core.view_user"),
            Ok(PermissionBits::VIEW_USER));
        assert_eq!(PermissionBits::from_codename("home.change_userrole"),
            Ok(PermissionBits::CHANGE_ROLE));
        assert_eq!(PermissionBits::from_codename("core.add_usergroup"),
            Ok(PermissionBits::ADD_ROLE));
        assert_eq!(PermissionBits::from_codename("schools.add_module"),
            Ok(PermissionBits::ADD_MODULE));
        assert_eq!(PermissionBits::from_codename("schools.delete_unit"),
            Ok(PermissionBits::DELETE_MODULE));
        assert_eq!(PermissionBits::from_codename("home.change_orgdetail"),
            Ok(PermissionBits::CHANGE_ORG));
    }

    #[test]
    fn codename_without_dot_is_invalid_format() {
        assert_eq!(PermissionBits::from_codename("view_user"),
            Err(ParseCodenameError::InvalidFormat("view_user".into())));
    }

    #[test]
    fn unknown_codename_is_not_found() {
        assert_eq!(PermissionBits::from_codename("core.fly_user"),
            Err(ParseCodenameError::NotFound("core.fly_user".into())));
        assert_eq!(PermissionBits::from_codename("schools.view_user"),
            Err(ParseCodenameError::NotFound("schools.view_user".into())));
        assert_eq!(PermissionBits::from_codename("shop.view_user"),
            Err(ParseCodenameError::NotFound("shop.view_user".into())));
    }

    #[test]
    fn codenames_parse_back() {
        let all = PermissionBits::all();
        let parsed = all.codenames()
            .iter()
            .map(|name| PermissionBits::from_codename(name).unwrap())
            .fold(PermissionBits::empty(), |acc, bits| acc | bits);
        assert_eq!(parsed, all);
    }

    #[test]
    fn require_reports_missing_bits() {
        let held = PermissionBits::VIEW_USER | PermissionBits::VIEW_SCHOOL;
        assert!(held.require(PermissionBits::VIEW_USER).is_ok());

        let err = held.require(PermissionBits::VIEW_USER | PermissionBits::ADD_SCHOOL)
            .unwrap_err();
        assert_eq!(err.0, PermissionBits::ADD_SCHOOL);
    }

    #[test]
    fn default_role_sets() {
        assert_eq!(PermissionBits::student(), PermissionBits::VIEW_USER);
        assert!(PermissionBits::instructor().contains(
            PermissionBits::VIEW_USER | PermissionBits::CHANGE_USER));
        assert!(!PermissionBits::instructor().contains(PermissionBits::DELETE_USER));
    }

    #[test]
    fn serializes_as_codenames_in_json() {
        let bits = PermissionBits::VIEW_USER | PermissionBits::ADD_MODULE;
        let json = serde_json::to_value(bits).unwrap();
        assert_eq!(json, serde_json::json!(["core.view_user", "schools.add_module"]));

        let back: PermissionBits = serde_json::from_value(json).unwrap();
        assert_eq!(back, bits);
    }

    #[test]
    fn deserializes_from_integer() {
        let bits: PermissionBits = serde_json::from_str("17").unwrap();
        assert_eq!(bits, PermissionBits::VIEW_USER | PermissionBits::VIEW_ROLE);
    }
}
