//! Access log table layout and the SQL built from it
//!
//! Column order here is the wire order of the `L` command: the probe query,
//! the insert statement and payload parsing all walk the same list.

/// Store-assigned identifier, never supplied by Squid.
pub const ID_COLUMN: &str = "id";

/// Caller-supplied columns, in protocol order.
pub const RECORD_COLUMNS: [&str; 12] = [
    "time_since_epoch",
    "response_time",
    "client_src_ip_addr",
    "squid_request_status",
    "http_status_code",
    "reply_size",
    "request_method",
    "request_url",
    "username",
    "squid_hier_status",
    "server_ip_addr",
    "mime_type",
];

/// Number of values an append command must carry.
pub const FIELD_COUNT: usize = RECORD_COLUMNS.len();

fn column_list() -> String {
    std::iter::once(ID_COLUMN)
        .chain(RECORD_COLUMNS)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads at most one row touching every column. Wrapped in `COUNT(*)` so the
/// result is a single integer whatever the column types are.
pub fn probe_query(table: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM (SELECT {} FROM {} LIMIT 1) AS probe",
        column_list(),
        table
    )
}

/// Insert with `NULL` for the identifier and one placeholder per record column.
pub fn insert_statement(table: &str) -> String {
    let placeholders = vec!["?"; FIELD_COUNT].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES (NULL, {})",
        table,
        column_list(),
        placeholders
    )
}
