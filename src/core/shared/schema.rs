diesel::table! {
    users (id) {
        id -> Uuid,
        email -> Text,
        name -> Text,
        role -> Text,
        password_hash -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    sessions (id) {
        id -> Uuid,
        user_id -> Uuid,
        token_hash -> Text,
        expires_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    contacts (id) {
        id -> Uuid,
        first_name -> Text,
        last_name -> Text,
        email -> Text,
        phone -> Nullable<Text>,
        company -> Nullable<Text>,
        position -> Nullable<Text>,
        lead_score -> Int4,
        lead_status -> Text,
        source -> Nullable<Text>,
        tags -> Array<Text>,
        notes -> Nullable<Text>,
        last_contact_date -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    activities (id) {
        id -> Uuid,
        contact_id -> Uuid,
        activity_type -> Text,
        title -> Text,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    tasks (id) {
        id -> Uuid,
        title -> Text,
        description -> Nullable<Text>,
        contact_id -> Nullable<Uuid>,
        priority -> Text,
        status -> Text,
        assignee -> Nullable<Text>,
        due_date -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    deals (id) {
        id -> Uuid,
        title -> Text,
        contact_id -> Uuid,
        value -> Float8,
        stage -> Text,
        probability -> Int4,
        expected_close_date -> Nullable<Date>,
        actual_close_date -> Nullable<Date>,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    email_templates (id) {
        id -> Uuid,
        name -> Text,
        subject -> Text,
        body -> Text,
        category -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    whatsapp_templates (id) {
        id -> Uuid,
        name -> Text,
        body -> Text,
        category -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    invitations (id) {
        id -> Uuid,
        email -> Text,
        role -> Text,
        token -> Text,
        status -> Text,
        invited_by -> Nullable<Uuid>,
        message -> Nullable<Text>,
        expires_at -> Timestamptz,
        accepted_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(sessions -> users (user_id));
diesel::joinable!(activities -> contacts (contact_id));
diesel::joinable!(tasks -> contacts (contact_id));
diesel::joinable!(deals -> contacts (contact_id));
diesel::joinable!(invitations -> users (invited_by));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    sessions,
    contacts,
    activities,
    tasks,
    deals,
    email_templates,
    whatsapp_templates,
    invitations,
);
