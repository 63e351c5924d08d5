table! {
    audit_log (id) {
        id -> Int4,
        timestamp -> Timestamp,
        actor -> Nullable<Int4>,
        context -> Varchar,
        context_id -> Nullable<Int4>,
        kind -> Varchar,
        data -> Bytea,
    }
}

table! {
    email_addresses (id) {
        id -> Int4,
        email -> Varchar,
        is_active -> Bool,
        is_primary -> Bool,
        position -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    enrollments (id) {
        id -> Int4,
        student -> Int4,
        module -> Int4,
        date_enrolled -> Date,
        completed -> Bool,
    }
}

table! {
    modules (id) {
        id -> Int4,
        school -> Int4,
        title -> Varchar,
        description -> Text,
        position -> Int4,
    }
}

table! {
    org_details (name) {
        name -> crate::db::types::Org_detail_kind,
        value -> Varchar,
    }
}

table! {
    org_images (name) {
        name -> crate::db::types::Org_image_kind,
        path -> Varchar,
    }
}

table! {
    phone_numbers (id) {
        id -> Int4,
        number -> Varchar,
        is_active -> Bool,
        is_primary -> Bool,
        use_for_whatsapp -> Bool,
        position -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    physical_addresses (id) {
        id -> Int4,
        label -> Varchar,
        building -> Varchar,
        street_address -> Varchar,
        city -> Varchar,
        state_province -> Varchar,
        postal_code -> Varchar,
        country -> Varchar,
        map_embed_url -> Varchar,
        is_active -> Bool,
        use_in_contact_form -> Bool,
        position -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    roles (id) {
        id -> Int4,
        name -> Varchar,
        display_name -> Varchar,
        description -> Text,
        is_staff_role -> Bool,
        is_default_role -> Bool,
        permissions -> Int4,
    }
}

table! {
    schools (id) {
        id -> Int4,
        name -> Varchar,
        description -> Text,
    }
}

table! {
    sessions (id) {
        id -> Int4,
        user -> Int4,
        expires -> Timestamp,
        last_used -> Timestamp,
    }
}

table! {
    social_media_links (id) {
        id -> Int4,
        name -> crate::db::types::Social_platform,
        url -> Varchar,
        is_active -> Bool,
        position -> Int4,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
        email -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        password -> Bytea,
        salt -> Bytea,
        is_superuser -> Bool,
        is_staff -> Bool,
        is_active -> Bool,
        role -> Nullable<Int4>,
        date_joined -> Timestamp,
    }
}

joinable!(audit_log -> users (actor));
joinable!(enrollments -> modules (module));
joinable!(enrollments -> users (student));
joinable!(modules -> schools (school));
joinable!(sessions -> users (user));
joinable!(users -> roles (role));

allow_tables_to_appear_in_same_query!(
    audit_log,
    email_addresses,
    enrollments,
    modules,
    org_details,
    org_images,
    phone_numbers,
    physical_addresses,
    roles,
    schools,
    sessions,
    social_media_links,
    users,
);
