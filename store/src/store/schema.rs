//! Baseline schema for the person table, applied idempotently at startup.
//! Constraints the storage engine enforces: non-null names, unique email
//! (nullable, multiple NULLs allowed), indexed name columns.

pub const CREATE_PERSON_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS "public"."person" (
        "id" uuid NOT NULL,
        "first_name" varchar(100) NOT NULL,
        "last_name" varchar(100) NOT NULL,
        "email" varchar(255),
        "phone" varchar(20),
        "address" text,
        "created_at" timestamptz NOT NULL DEFAULT now(),
        "updated_at" timestamptz NOT NULL DEFAULT now(),
        PRIMARY KEY ("id")
    );
"#;

pub const CREATE_UNIQUE_EMAIL_INDEX: &str = r#"
    CREATE UNIQUE INDEX IF NOT EXISTS "person_email_key"
        ON "public"."person" ("email");
"#;

pub const CREATE_FIRST_NAME_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS "person_first_name_idx"
        ON "public"."person" ("first_name");
"#;

pub const CREATE_LAST_NAME_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS "person_last_name_idx"
        ON "public"."person" ("last_name");
"#;

pub const STATEMENTS: [&str; 4] = [
    CREATE_PERSON_TABLE,
    CREATE_UNIQUE_EMAIL_INDEX,
    CREATE_FIRST_NAME_INDEX,
    CREATE_LAST_NAME_INDEX,
];
