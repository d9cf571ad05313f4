//! Parameterized process list query builder
//!
//! Operator-supplied values are always bound as parameters; only columns
//! from a fixed allow-list can appear in the ORDER BY clause.

use crate::error::ConfigError;
use std::fmt;

/// Columns that may be filtered or ordered on
pub const ALLOWED_COLUMNS: &[&str] = &["id", "user", "host", "db", "command", "time", "state", "info"];

/// Projection. `id`/`time` are cast so their wire types are fixed.
const SELECT_CLAUSE: &str = "SELECT CAST(id AS UNSIGNED) AS id, user, host, db, command, \
     CAST(time AS SIGNED) AS time, state, info FROM information_schema.processlist";

/// Filters applied to every query, regardless of operator input.
/// `CONNECTION_ID()` is evaluated per execution, so the watcher never sees
/// its own session, including after a reconnect.
const BASE_CONDITIONS: &[&str] = &[
    "command != 'Binlog Dump'",
    "(db != 'information_schema' OR db IS NULL)",
    "id != CONNECTION_ID()",
];

const SYSTEM_USER_CONDITION: &str = "user != 'system user'";

/// Value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Text(String),
    Unsigned(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One `column [ASC|DESC]` term of an ORDER BY clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    column: &'static str,
    direction: Option<SortDirection>,
}

impl OrderTerm {
    /// Ascending term on a built-in column. Operator input goes through
    /// [`parse_order_by`] instead.
    pub(crate) fn asc(column: &'static str) -> Self {
        Self {
            column,
            direction: Some(SortDirection::Asc),
        }
    }
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(SortDirection::Asc) => write!(f, "{} ASC", self.column),
            Some(SortDirection::Desc) => write!(f, "{} DESC", self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

fn allowed_column(name: &str) -> Option<&'static str> {
    ALLOWED_COLUMNS
        .iter()
        .copied()
        .find(|col| col.eq_ignore_ascii_case(name))
}

/// Parse an operator ORDER BY clause such as `"db desc, time"`
pub fn parse_order_by(clause: &str) -> Result<Vec<OrderTerm>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidOrderBy {
        clause: clause.to_string(),
        reason: reason.to_string(),
    };

    let mut terms = Vec::new();
    for part in clause.split(',') {
        let mut tokens = part.split_whitespace();
        let column = tokens.next().ok_or_else(|| invalid("empty term"))?;
        let column = allowed_column(column)
            .ok_or_else(|| invalid(&format!("unknown column '{}'", column)))?;

        let direction = match tokens.next() {
            None => None,
            Some(d) if d.eq_ignore_ascii_case("asc") => Some(SortDirection::Asc),
            Some(d) if d.eq_ignore_ascii_case("desc") => Some(SortDirection::Desc),
            Some(d) => return Err(invalid(&format!("unknown direction '{}'", d))),
        };
        if tokens.next().is_some() {
            return Err(invalid("too many tokens in term"));
        }

        terms.push(OrderTerm { column, direction });
    }

    Ok(terms)
}

/// Escape LIKE wildcards so a prefix matches literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 1);
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// A ready-to-run process list query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessListQuery {
    sql: String,
    binds: Vec<BindValue>,
    criteria: Vec<String>,
}

impl ProcessListQuery {
    pub fn builder() -> ProcessListQueryBuilder {
        ProcessListQueryBuilder::new()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }

    /// Human-readable description of the operator criteria, e.g. for the
    /// kill report. Values are shown for display only, never spliced into SQL.
    pub fn describe_criteria(&self) -> String {
        self.criteria.join(" AND ")
    }
}

/// Builder for [`ProcessListQuery`]
#[derive(Debug, Default)]
pub struct ProcessListQueryBuilder {
    conditions: Vec<String>,
    binds: Vec<BindValue>,
    criteria: Vec<String>,
    ignore_system_user: bool,
    order: Vec<OrderTerm>,
}

impl ProcessListQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn text_condition(mut self, column: &str, op: &str, value: String, shown: &str) -> Self {
        self.conditions.push(format!("{} {} ?", column, op));
        self.criteria.push(format!("{} {} '{}'", column, op, shown));
        self.binds.push(BindValue::Text(value));
        self
    }

    /// Sessions running this command
    pub fn command(self, command: &str) -> Self {
        self.text_condition("command", "=", command.to_string(), command)
    }

    /// Sessions in this exact state
    pub fn state(self, state: &str) -> Self {
        self.text_condition("state", "=", state.to_string(), state)
    }

    /// Sessions running against this database
    pub fn database(self, database: &str) -> Self {
        self.text_condition("db", "=", database.to_string(), database)
    }

    /// Sessions whose statement starts with this text
    pub fn info_prefix(self, prefix: &str) -> Self {
        self.text_condition("info", "LIKE", escape_like(prefix), &format!("{}%", prefix))
    }

    /// Sessions running at least this many seconds
    pub fn min_elapsed(mut self, secs: u64) -> Self {
        self.conditions.push("time >= ?".to_string());
        self.criteria.push(format!("time >= {}", secs));
        self.binds.push(BindValue::Unsigned(secs));
        self
    }

    /// Sessions running any of these commands. Not an operator criterion.
    pub fn commands_in(mut self, commands: &[&str]) -> Self {
        if commands.is_empty() {
            return self;
        }
        let placeholders = vec!["?"; commands.len()].join(", ");
        self.conditions.push(format!("command IN ({})", placeholders));
        self.binds
            .extend(commands.iter().map(|c| BindValue::Text(c.to_string())));
        self
    }

    pub fn ignore_system_user(mut self, ignore: bool) -> Self {
        self.ignore_system_user = ignore;
        self
    }

    pub fn order_by(mut self, term: OrderTerm) -> Self {
        self.order.push(term);
        self
    }

    pub fn build(self) -> ProcessListQuery {
        let mut conditions = self.conditions;
        conditions.extend(BASE_CONDITIONS.iter().map(|c| c.to_string()));
        if self.ignore_system_user {
            conditions.push(SYSTEM_USER_CONDITION.to_string());
        }

        let mut sql = format!("{} WHERE {}", SELECT_CLAUSE, conditions.join(" AND "));
        if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(ToString::to_string).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        ProcessListQuery {
            sql,
            binds: self.binds,
            criteria: self.criteria,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_query() {
        let query = ProcessListQuery::builder().build();
        assert_eq!(
            query.sql(),
            format!(
                "{} WHERE command != 'Binlog Dump' AND (db != 'information_schema' OR db IS NULL) \
                 AND id != CONNECTION_ID()",
                SELECT_CLAUSE
            )
        );
        assert!(query.binds().is_empty());
        assert_eq!(query.describe_criteria(), "");
    }

    #[test]
    fn test_filters_are_bound() {
        let query = ProcessListQuery::builder()
            .command("Query")
            .min_elapsed(30)
            .database("shop'; DROP TABLE x; --")
            .ignore_system_user(true)
            .build();

        assert!(query.sql().contains("command = ? AND time >= ? AND db = ?"));
        assert!(query.sql().contains("user != 'system user'"));
        assert!(!query.sql().contains("DROP TABLE"));
        assert_eq!(
            query.binds(),
            &[
                BindValue::Text("Query".to_string()),
                BindValue::Unsigned(30),
                BindValue::Text("shop'; DROP TABLE x; --".to_string()),
            ]
        );
        assert_eq!(
            query.describe_criteria(),
            "command = 'Query' AND time >= 30 AND db = 'shop'; DROP TABLE x; --'"
        );
    }

    #[test]
    fn test_info_prefix_escapes_wildcards() {
        let query = ProcessListQuery::builder().info_prefix("select 100%_").build();
        assert!(query.sql().contains("info LIKE ?"));
        assert_eq!(
            query.binds(),
            &[BindValue::Text("select 100\\%\\_%".to_string())]
        );
        assert_eq!(query.describe_criteria(), "info LIKE 'select 100%_%'");
    }

    #[test]
    fn test_parse_order_by() {
        let terms = parse_order_by("DB desc, time,  ID asc").unwrap();
        let rendered: Vec<String> = terms.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["db DESC", "time", "id ASC"]);

        assert!(parse_order_by("").is_err());
        assert!(parse_order_by("time,").is_err());
        assert!(parse_order_by("password").is_err());
        assert!(parse_order_by("time sideways").is_err());
        assert!(parse_order_by("time desc limit").is_err());
        assert!(parse_order_by("sleep(10)").is_err());
    }

    #[test]
    fn test_order_and_commands_in() {
        let query = ProcessListQuery::builder()
            .commands_in(&["Query", "Connect"])
            .order_by(OrderTerm::asc("time"))
            .order_by(OrderTerm::asc("id"))
            .build();

        assert!(query.sql().contains("WHERE command IN (?, ?) AND command != 'Binlog Dump'"));
        assert!(query.sql().ends_with(" ORDER BY time ASC, id ASC"));
        assert_eq!(query.binds().len(), 2);
        // The defaults profile is not an operator criterion
        assert_eq!(query.describe_criteria(), "");
    }
}
