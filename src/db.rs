use crate::error::BankResult;
use rusqlite::{Connection, Transaction};
use std::path::Path;

pub const DB_FILE_NAME: &str = "evalbank.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Runs `f` inside one transaction: commit on `Ok`, rollback on `Err`.
pub fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Transaction<'_>) -> BankResult<T>,
) -> BankResult<T> {
    let tx = conn.unchecked_transaction()?;
    match f(&tx) {
        Ok(v) => {
            tx.commit()?;
            Ok(v)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bank_groups(
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            source TEXT NOT NULL DEFAULT 'BANK',
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(group_id) REFERENCES bank_groups(id)
        )",
        [],
    )?;
    // Workspaces created before professor notes existed lack the column.
    ensure_questions_scratchpad(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_questions_group ON questions(group_id, status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS question_tags(
            question_id TEXT NOT NULL,
            label TEXT NOT NULL,
            PRIMARY KEY(question_id, label),
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS multiple_choice(
            question_id TEXT PRIMARY KEY,
            grading_policy TEXT NOT NULL DEFAULT 'GRADUAL_CREDIT',
            activate_student_comment INTEGER NOT NULL DEFAULT 0,
            student_comment_label TEXT,
            activate_selection_limit INTEGER NOT NULL DEFAULT 0,
            selection_limit INTEGER,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS multiple_choice_options(
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            is_correct INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(question_id) REFERENCES multiple_choice(question_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mc_options_question ON multiple_choice_options(question_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS true_false(
            question_id TEXT PRIMARY KEY,
            is_true INTEGER,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS essay(
            question_id TEXT PRIMARY KEY,
            solution TEXT,
            template TEXT,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS web(
            question_id TEXT PRIMARY KEY,
            template_html TEXT,
            template_css TEXT,
            template_js TEXT,
            solution_html TEXT,
            solution_css TEXT,
            solution_js TEXT,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exact_match(
            question_id TEXT PRIMARY KEY,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS exact_match_fields(
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            statement TEXT NOT NULL,
            match_regex TEXT,
            FOREIGN KEY(question_id) REFERENCES exact_match(question_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exact_match_fields_question ON exact_match_fields(question_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS code(
            question_id TEXT PRIMARY KEY,
            language TEXT NOT NULL,
            sandbox_image TEXT NOT NULL,
            sandbox_before_all TEXT,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS code_files(
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            nature TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            path TEXT NOT NULL,
            content TEXT NOT NULL,
            student_permission TEXT NOT NULL DEFAULT 'UPDATE',
            FOREIGN KEY(question_id) REFERENCES code(question_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_code_files_question ON code_files(question_id, nature)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS code_test_cases(
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            idx INTEGER NOT NULL,
            exec TEXT NOT NULL,
            input TEXT NOT NULL,
            expected_output TEXT NOT NULL,
            FOREIGN KEY(question_id) REFERENCES code(question_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS database_questions(
            question_id TEXT PRIMARY KEY,
            image TEXT NOT NULL,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS database_queries(
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            title TEXT,
            description TEXT,
            content TEXT NOT NULL,
            template TEXT,
            student_permission TEXT NOT NULL DEFAULT 'UPDATE',
            FOREIGN KEY(question_id) REFERENCES database_questions(question_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_answers(
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            user_email TEXT NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(question_id, user_email),
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_answer_items(
            id TEXT PRIMARY KEY,
            student_answer_id TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            item_ref TEXT,
            content TEXT NOT NULL,
            FOREIGN KEY(student_answer_id) REFERENCES student_answers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_answer_gradings(
            student_answer_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            points_obtained REAL NOT NULL DEFAULT 0,
            signed_by TEXT,
            comment TEXT,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_answer_id) REFERENCES student_answers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_answers_question ON student_answers(question_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_answer_items_answer ON student_answer_items(student_answer_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS evaluations(
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            label TEXT NOT NULL,
            phase TEXT NOT NULL DEFAULT 'DRAFT',
            archival_status TEXT NOT NULL DEFAULT 'ACTIVE',
            archive_path TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(group_id) REFERENCES bank_groups(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS evaluation_questions(
            evaluation_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            points REAL NOT NULL DEFAULT 1,
            PRIMARY KEY(evaluation_id, question_id),
            FOREIGN KEY(evaluation_id) REFERENCES evaluations(id),
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_evaluations_group ON evaluations(group_id)",
        [],
    )?;

    Ok(())
}

fn ensure_questions_scratchpad(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "questions", "scratchpad")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE questions ADD COLUMN scratchpad TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
