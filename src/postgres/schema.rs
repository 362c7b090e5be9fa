//! Table layout and SQL generation.

/// Single table definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PgTable {
    /// Table name, without quoting.
    pub name: String,
    /// `CREATE TABLE` statement.
    pub create_sql: String,
}

/// Ordered set of tables, plus statements executed after creating them.
///
/// Tables are created in the order they were added and dropped in reverse.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct PgSchema {
    tables: Vec<PgTable>,
    statements: Vec<String>,
}

impl PgSchema {
    /// Create empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add table definition.
    pub fn with_table(mut self, name: impl Into<String>, create_sql: impl Into<String>) -> Self {
        self.tables.push(PgTable {
            name: name.into(),
            create_sql: create_sql.into(),
        });
        self
    }

    /// Add statement to run after all tables are created.
    ///
    /// Indexes, views and functions go here.
    pub fn with_statement(mut self, sql: impl Into<String>) -> Self {
        self.statements.push(sql.into());
        self
    }

    /// Defined tables, in creation order.
    #[must_use]
    pub fn tables(&self) -> &[PgTable] {
        &self.tables
    }

    /// Statement dropping every table, or `None` for a schema without tables.
    #[must_use]
    pub fn drop_sql(&self) -> Option<String> {
        if self.tables.is_empty() {
            return None;
        }
        let names: Vec<String> = self
            .tables
            .iter()
            .rev()
            .map(|t| quote_ident(&t.name))
            .collect();
        Some(format!("DROP TABLE IF EXISTS {} CASCADE", names.join(", ")))
    }

    /// Statements creating the whole schema, in execution order.
    #[must_use]
    pub fn create_statements(&self, unlogged: bool) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| {
                if unlogged {
                    make_unlogged(&t.create_sql)
                } else {
                    t.create_sql.clone()
                }
            })
            .chain(self.statements.iter().cloned())
            .collect()
    }

    /// Statement removing all rows from every table, or `None` for a schema without tables.
    #[must_use]
    pub fn truncate_sql(&self) -> Option<String> {
        if self.tables.is_empty() {
            return None;
        }
        let names: Vec<String> = self.tables.iter().map(|t| quote_ident(&t.name)).collect();
        Some(format!("TRUNCATE TABLE {} CASCADE", names.join(", ")))
    }
}

/// Quote SQL identifier.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Rewrite leading `CREATE TABLE` into `CREATE UNLOGGED TABLE`.
///
/// Statements of any other shape are returned unchanged.
fn make_unlogged(sql: &str) -> String {
    let trimmed = sql.trim_start();
    let mut words = trimmed.split_whitespace();
    match (words.next(), words.next()) {
        (Some(create), Some(table))
            if create.eq_ignore_ascii_case("CREATE") && table.eq_ignore_ascii_case("TABLE") =>
        {
            let table_pos = create.len() + trimmed[create.len()..].find(table).unwrap_or(0);
            format!("CREATE UNLOGGED {}", &trimmed[table_pos..])
        }
        _ => sql.to_owned(),
    }
}
