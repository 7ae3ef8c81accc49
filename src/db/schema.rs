// Diesel schema for the login sink table.
//
// The table has no key of its own; `masked_ip` is declared as the primary
// key only because `table!` requires one.

diesel::table! {
    user_logins (masked_ip) {
        user_id -> Nullable<Varchar>,
        app_version -> Int4,
        device_type -> Nullable<Varchar>,
        masked_ip -> Varchar,
        locale -> Varchar,
        masked_device_id -> Varchar,
        create_date -> Date,
    }
}

/// DDL used by `--create-table`
pub const CREATE_USER_LOGINS: &str = r#"
    CREATE TABLE IF NOT EXISTS user_logins (
        user_id VARCHAR(128),
        app_version INTEGER,
        device_type VARCHAR(32),
        masked_ip VARCHAR(256),
        locale VARCHAR(32),
        masked_device_id VARCHAR(256),
        create_date DATE
    )
"#;
