use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            role TEXT NOT NULL DEFAULT 'member',
            is_staff INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            isbn13 TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            language TEXT,
            publish_year INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS copies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL REFERENCES books(id),
            barcode TEXT NOT NULL UNIQUE,
            location TEXT,
            condition_note TEXT,
            status TEXT NOT NULL DEFAULT 'AVAILABLE',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            borrower_id INTEGER NOT NULL REFERENCES users(id),
            copy_id INTEGER NOT NULL REFERENCES copies(id),
            checked_out_at TEXT NOT NULL,
            due_at TEXT NOT NULL,
            returned_at TEXT,
            renew_count INTEGER NOT NULL DEFAULT 0,
            note TEXT
        )
        "#
        .to_owned(),
    ))
    .await?;

    // One open loan per copy, enforced at the storage layer as well as in
    // the loan engine.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_loans_one_open_per_copy
            ON loans (copy_id) WHERE returned_at IS NULL
        "#
        .to_owned(),
    ))
    .await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS holds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL REFERENCES books(id),
            user_id INTEGER NOT NULL REFERENCES users(id),
            queue_position INTEGER NOT NULL,
            is_ready INTEGER NOT NULL DEFAULT 0,
            expires_at TEXT,
            reserved_copy_id INTEGER REFERENCES copies(id),
            created_at TEXT NOT NULL,
            canceled_at TEXT
        )
        "#
        .to_owned(),
    ))
    .await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS fines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            loan_id INTEGER NOT NULL REFERENCES loans(id),
            amount_minor INTEGER NOT NULL,
            reason TEXT NOT NULL,
            created_at TEXT NOT NULL,
            paid_at TEXT,
            payment_reference TEXT
        )
        "#
        .to_owned(),
    ))
    .await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS pickup_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            requester_id INTEGER NOT NULL REFERENCES users(id),
            status TEXT NOT NULL DEFAULT 'PENDING',
            pickup_location TEXT,
            pickup_by TEXT,
            requested_at TEXT NOT NULL,
            prepared_at TEXT,
            ready_at TEXT,
            picked_up_at TEXT,
            canceled_at TEXT
        )
        "#
        .to_owned(),
    ))
    .await?;

    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS pickup_request_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id INTEGER NOT NULL REFERENCES pickup_requests(id),
            book_id INTEGER NOT NULL REFERENCES books(id),
            assigned_copy_id INTEGER REFERENCES copies(id)
        )
        "#
        .to_owned(),
    ))
    .await?;

    // Singleton configuration row; the rule engine falls back to compiled
    // defaults when it is absent.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        r#"
        CREATE TABLE IF NOT EXISTS policy (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_loan_days INTEGER NOT NULL,
            lecturer_loan_days INTEGER NOT NULL,
            member_loan_limit INTEGER NOT NULL,
            lecturer_loan_limit INTEGER NOT NULL,
            max_renewals INTEGER NOT NULL,
            fine_rate_minor_per_day INTEGER NOT NULL,
            hold_pickup_days INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#
        .to_owned(),
    ))
    .await?;

    Ok(())
}
