//! Administrative tooling for the enrollment service.

use sqlx::postgres::PgPoolOptions;
use sqlx::Row;

fn print_help() {
    eprintln!(
        "\
enrollment-admin

USAGE:
  enrollment-admin <command>

COMMANDS:
  migrate            Run database migrations
  audit-roll-ups     Compare course_progress counters against the
                     learning_progress records they are derived from
                     and report drift (read-only)

ENVIRONMENT:
  DATABASE_URL       PostgreSQL connection URL
"
    );
}

async fn connect() -> anyhow::Result<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await?;
    Ok(pool)
}

async fn migrate() -> anyhow::Result<()> {
    let pool = connect().await?;
    opencourse_enrollment::migrations::run_postgres(&pool).await?;
    println!("migrations applied");
    Ok(())
}

/// The roll-up is maintained incrementally; this audit recomputes it
/// the slow way and flags any enrollment where the two disagree.
async fn audit_roll_ups() -> anyhow::Result<()> {
    let pool = connect().await?;

    let rows = sqlx::query(
        r#"
        SELECT cp.enrollment_id,
               cp.lessons_completed,
               COUNT(lp.progress_id) FILTER (WHERE lp.is_completed) AS actual_completed
        FROM course_progress cp
        LEFT JOIN learning_progress lp ON lp.enrollment_id = cp.enrollment_id
        GROUP BY cp.enrollment_id, cp.lessons_completed
        HAVING cp.lessons_completed
               <> COUNT(lp.progress_id) FILTER (WHERE lp.is_completed)
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if rows.is_empty() {
        println!("all roll-ups consistent");
        return Ok(());
    }

    for row in &rows {
        let enrollment_id: uuid::Uuid = row.get("enrollment_id");
        let counter: i32 = row.get("lessons_completed");
        let actual: i64 = row.get("actual_completed");
        println!("drift: enrollment {enrollment_id} counter={counter} actual={actual}");
    }
    anyhow::bail!("{} roll-up(s) out of sync", rows.len());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("migrate") => migrate().await,
        Some("audit-roll-ups") => audit_roll_ups().await,
        _ => {
            print_help();
            std::process::exit(2);
        }
    }
}
