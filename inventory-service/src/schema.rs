diesel::table! {
    inventory (product_id) {
        product_id -> Varchar,
        stock -> Int4,
        reserved_stock -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    inventory_reservations (id) {
        id -> Uuid,
        product_id -> Varchar,
        holder_id -> Varchar,
        quantity -> Int4,
        expires_at -> Timestamptz,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(inventory_reservations -> inventory (product_id));

diesel::allow_tables_to_appear_in_same_query!(
    inventory,
    inventory_reservations,
);
