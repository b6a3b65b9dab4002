pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  user_id      TEXT PRIMARY KEY,
  display_name TEXT
);
"#;

pub const CREATE_DAILY_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS daily_logs (
  id                INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id           TEXT NOT NULL,
  date              TEXT NOT NULL,
  mood_score        REAL,
  mood              TEXT,
  pain_level        REAL,
  sleep_hours       REAL,
  mobility_category TEXT,
  water_intake      REAL,
  exercise_minutes  REAL,
  energy_level      REAL,
  symptom_flags     TEXT NOT NULL DEFAULT '[]',
  recorded_at       INTEGER NOT NULL,
  UNIQUE(user_id, date)
);
"#;

pub const CREATE_CAMERA_MOODS: &str = r#"
CREATE TABLE IF NOT EXISTS camera_moods (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id     TEXT NOT NULL,
  captured_at TEXT NOT NULL,
  date        TEXT NOT NULL,
  mood        TEXT NOT NULL,
  UNIQUE(user_id, captured_at)
);
"#;

pub const CREATE_REPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id      TEXT NOT NULL,
  window_end   TEXT NOT NULL,
  generated_at INTEGER NOT NULL,
  md_path      TEXT NOT NULL,
  json_path    TEXT NOT NULL,
  html_path    TEXT NOT NULL,
  UNIQUE(user_id, window_end)
);
"#;

pub const INDEX_DAILY_LOGS_USER_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_daily_logs_user_date ON daily_logs(user_id, date);";

pub const INDEX_CAMERA_MOODS_USER_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_camera_moods_user_date ON camera_moods(user_id, date);";

pub const INDEX_REPORTS_WINDOW_END: &str =
    "CREATE INDEX IF NOT EXISTS idx_reports_window_end ON reports(window_end);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_DAILY_LOGS,
        CREATE_CAMERA_MOODS,
        CREATE_REPORTS,
        INDEX_DAILY_LOGS_USER_DATE,
        INDEX_CAMERA_MOODS_USER_DATE,
        INDEX_REPORTS_WINDOW_END,
    ]
}
