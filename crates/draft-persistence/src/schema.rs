//! Esquema Diesel (escrito a mano, equivalente a `diesel print-schema`).

diesel::table! {
    draft_scalars (storage_key) {
        storage_key -> Text,
        payload -> Text,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    draft_images (namespace, draft_id, path) {
        namespace -> Text,
        draft_id -> Text,
        path -> Text,
        name -> Text,
        size -> BigInt,
        last_modified -> BigInt,
        mime_type -> Nullable<Text>,
        content -> Bytea,
        sha256 -> Text,
        saved_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    draft_scalars,
    draft_images,
);
