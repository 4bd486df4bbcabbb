use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::{Dialect, JoinType};
use crate::error::{DbError, DbResult};
use crate::types::{Record, RowValues};

type LazyRegex = LazyLock<Result<Regex, regex::Error>>;

static JOIN_CONNECTOR: LazyRegex = LazyLock::new(|| Regex::new(r"(?i)\s+(AND|OR)\s+"));
static JOIN_COMPARISON: LazyRegex =
    LazyLock::new(|| Regex::new(r"^\s*(\S+?)\s*(<=|>=|<>|!=|=|<|>)\s*(\S+)\s*$"));
static IDENTIFIER: LazyRegex = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.([A-Za-z_][A-Za-z0-9_$]*|\*))?$")
});
static SELECT_ALIAS: LazyRegex = LazyLock::new(|| Regex::new(r"(?i)^(.+?)\s+as\s+(\S+)$"));
static TABLE_ALIAS: LazyRegex =
    LazyLock::new(|| Regex::new(r"(?i)^(\S+)\s+(?:as\s+)?([A-Za-z_][A-Za-z0-9_]*)$"));

fn regex(cell: &'static LazyRegex) -> DbResult<&'static Regex> {
    cell.as_ref()
        .map_err(|e| DbError::InvalidInput(format!("internal pattern failed to compile: {e}")))
}

fn strip_quotes(name: &str) -> String {
    name.trim().chars().filter(|c| *c != '`' && *c != '"').collect()
}

/// How a predicate attaches to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Conj {
    And,
    Or,
}

impl Conj {
    fn as_str(self) -> &'static str {
        match self {
            Conj::And => "AND",
            Conj::Or => "OR",
        }
    }
}

/// Which predicate list a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Clause {
    Where,
    Having,
}

impl Clause {
    fn keyword(self) -> &'static str {
        match self {
            Clause::Where => "WHERE",
            Clause::Having => "HAVING",
        }
    }
}

/// Which side(s) of a LIKE value get a `%` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeSide {
    #[default]
    Both,
    Before,
    After,
    /// Match the escaped value exactly
    None,
}

/// One WHERE or HAVING list together with its conjunction state.
///
/// `conj` is true when the next predicate must be joined with AND/OR; it is false at the
/// start and directly after a group opens.
#[derive(Debug, Clone, Default)]
pub(crate) struct Predicates {
    parts: Vec<String>,
    pub(crate) params: Vec<RowValues>,
    conj: bool,
    depth: usize,
    /// An OR joins two predicates outside any group.
    top_or: bool,
}

impl Predicates {
    fn lead(&self, clause: Clause, conj: Conj) -> Option<&'static str> {
        if self.parts.is_empty() {
            Some(clause.keyword())
        } else if self.conj {
            Some(conj.as_str())
        } else {
            None
        }
    }

    fn note_top_or(&mut self, conj: Conj) {
        if self.depth == 0 && self.conj && conj == Conj::Or && !self.parts.is_empty() {
            self.top_or = true;
        }
    }

    fn push(&mut self, clause: Clause, conj: Conj, text: &str, params: Vec<RowValues>) {
        self.note_top_or(conj);
        let part = match self.lead(clause, conj) {
            Some(lead) => format!("{lead} {text}"),
            None => text.to_string(),
        };
        self.parts.push(part);
        self.params.extend(params);
        self.conj = true;
    }

    fn open(&mut self, clause: Clause, conj: Conj, negate: bool) {
        self.note_top_or(conj);
        let opener = if negate { "NOT (" } else { "(" };
        let part = match self.lead(clause, conj) {
            Some(lead) => format!("{lead} {opener}"),
            None => opener.to_string(),
        };
        self.parts.push(part);
        self.conj = false;
        self.depth += 1;
    }

    fn close(&mut self) -> DbResult<()> {
        if self.depth == 0 {
            return Err(DbError::InvalidInput(
                "group_end called without an open group".to_string(),
            ));
        }
        self.depth -= 1;
        // an empty group is dropped rather than rendered as `()`
        if self.parts.last().is_some_and(|p| p.ends_with('(')) && !self.conj {
            self.parts.pop();
            self.conj = self.parts.last().is_some_and(|p| !p.ends_with('('));
            return Ok(());
        }
        self.parts.push(")".to_string());
        self.conj = true;
        Ok(())
    }

    /// Wrap the whole list in one group when it has a top-level OR, so a predicate
    /// appended afterwards applies to every branch.
    fn enclose(&mut self, clause: Clause) {
        if !self.top_or || self.depth > 0 {
            return;
        }
        if let Some(first) = self.parts.first_mut() {
            let body = first
                .strip_prefix(clause.keyword())
                .unwrap_or(first.as_str())
                .trim_start()
                .to_string();
            *first = format!("{} ({body}", clause.keyword());
        }
        self.parts.push(")".to_string());
        self.top_or = false;
        self.conj = true;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Render with parentheses glued to their contents: `WHERE (a OR b) AND c`.
    pub(crate) fn render(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            let glued = out.ends_with('(') || part == ")";
            if !out.is_empty() && !glued {
                out.push(' ');
            }
            out.push_str(part);
        }
        out
    }

    /// Rendered predicates without the leading clause keyword.
    pub(crate) fn body(&self, clause: Clause) -> String {
        let rendered = self.render();
        rendered
            .strip_prefix(clause.keyword())
            .map_or(rendered.clone(), |rest| rest.trim_start().to_string())
    }
}

/// Accumulated query state shared by every dialect's builder.
///
/// Fluent calls append fragments; a terminal call compiles them in the fixed order
/// select, from, join, where, group by, having, order by, limit, offset, lock.
#[derive(Debug, Clone)]
pub struct Fragments {
    pub(crate) dialect: Dialect,
    prefix: String,
    table_name: String,
    pub(crate) table: String,
    pub(crate) allow_truncate: bool,
    pub(crate) key: String,

    pub(crate) distinct: bool,
    pub(crate) select: Vec<String>,
    pub(crate) joins: Vec<String>,
    pub(crate) join_params: Vec<RowValues>,
    pub(crate) wheres: Predicates,
    pub(crate) group_by: Vec<String>,
    pub(crate) havings: Predicates,
    pub(crate) order_by: Vec<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) lock: bool,
    pub(crate) set_data: Vec<(String, String)>,
    pub(crate) set_params: Vec<RowValues>,
    aliases: Vec<String>,
    error: Option<DbError>,
}

impl Fragments {
    pub(crate) fn new(dialect: Dialect, prefix: &str, table: &str, allow_truncate: bool) -> Self {
        let mut fragments = Self {
            dialect,
            prefix: prefix.to_string(),
            table_name: strip_quotes(table),
            table: String::new(),
            allow_truncate,
            key: "id".to_string(),
            distinct: false,
            select: Vec::new(),
            joins: Vec::new(),
            join_params: Vec::new(),
            wheres: Predicates::default(),
            group_by: Vec::new(),
            havings: Predicates::default(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            lock: false,
            set_data: Vec::new(),
            set_params: Vec::new(),
            aliases: Vec::new(),
            error: None,
        };
        fragments.table = fragments.sanitize_table(table);
        fragments
    }

    /// Clear everything a query accumulated; the table binding stays.
    pub fn reset(&mut self) {
        self.distinct = false;
        self.select.clear();
        self.joins.clear();
        self.join_params.clear();
        self.wheres = Predicates::default();
        self.group_by.clear();
        self.havings = Predicates::default();
        self.order_by.clear();
        self.limit = None;
        self.offset = None;
        self.lock = false;
        self.set_data.clear();
        self.set_params.clear();
        self.aliases.clear();
        self.error = None;
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Unprefixed, unquoted table name the builder was created for.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Prefixed table name without quotes, as the catalog knows it.
    #[must_use]
    pub fn physical_table(&self) -> String {
        self.prefixed(&self.table_name)
    }

    #[must_use]
    pub fn has_conditions(&self) -> bool {
        !self.wheres.is_empty()
    }

    #[must_use]
    pub fn has_open_group(&self) -> bool {
        self.wheres.depth() > 0
    }

    /// Parenthesize the WHERE list when it has a top-level OR; otherwise a no-op.
    pub fn enclose_where(&mut self) -> &mut Self {
        self.wheres.enclose(Clause::Where);
        self
    }

    #[must_use]
    pub fn pending_error(&self) -> Option<&DbError> {
        self.error.as_ref()
    }

    pub(crate) fn fail(&mut self, err: DbError) -> &mut Self {
        if self.error.is_none() {
            self.error = Some(err);
        }
        self
    }

    /// Surface a deferred error or an unbalanced group before compiling.
    pub(crate) fn check(&self) -> DbResult<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.wheres.depth() > 0 || self.havings.depth() > 0 {
            return Err(DbError::InvalidInput(
                "query has a group_start without a matching group_end".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn placeholder(&self) -> &'static str {
        self.dialect.placeholder()
    }

    // ---- identifiers ----

    fn prefixed(&self, name: &str) -> String {
        if self.prefix.is_empty() || name.starts_with(&self.prefix) {
            name.to_string()
        } else {
            format!("{}{name}", self.prefix)
        }
    }

    /// Quote a table name, adding the prefix unless it is present or the name is a join
    /// alias.
    #[must_use]
    pub fn sanitize_table(&self, name: &str) -> String {
        let name = strip_quotes(name);
        if self.aliases.iter().any(|a| *a == name) {
            return self.dialect.quote_identifier(&name);
        }
        match name.split_once('.') {
            Some((schema, table)) => format!(
                "{}.{}",
                self.dialect.quote_identifier(schema),
                self.dialect.quote_identifier(&self.prefixed(table))
            ),
            None => self.dialect.quote_identifier(&self.prefixed(&name)),
        }
    }

    /// Quote a column; `table.column` quotes and prefixes the table part, `*` stays bare.
    #[must_use]
    pub fn sanitize_column(&self, name: &str) -> String {
        let name = strip_quotes(name);
        if name == "*" {
            return name;
        }
        match name.rsplit_once('.') {
            Some((table, column)) => {
                let column = if column == "*" {
                    "*".to_string()
                } else {
                    self.dialect.quote_identifier(column)
                };
                format!("{}.{column}", self.sanitize_table(table))
            }
            None => self.dialect.quote_identifier(&name),
        }
    }

    /// Sanitize a column, resolving a bare name against the FROM table.
    #[must_use]
    pub fn qualify(&self, name: &str) -> String {
        let stripped = strip_quotes(name);
        if stripped.contains('.') {
            self.sanitize_column(&stripped)
        } else if stripped == "*" {
            format!("{}.*", self.table)
        } else {
            format!("{}.{}", self.table, self.dialect.quote_identifier(&stripped))
        }
    }

    fn qualify_if_identifier(&self, token: &str) -> DbResult<String> {
        let stripped = strip_quotes(token);
        let upper = stripped.to_ascii_uppercase();
        if matches!(upper.as_str(), "NULL" | "TRUE" | "FALSE") {
            return Ok(token.to_string());
        }
        if regex(&IDENTIFIER)?.is_match(&stripped) {
            Ok(self.qualify(&stripped))
        } else {
            Ok(token.to_string())
        }
    }

    // ---- select list ----

    pub fn select(&mut self, columns: &str) -> &mut Self {
        let alias_re = match regex(&SELECT_ALIAS) {
            Ok(re) => re,
            Err(e) => return self.fail(e),
        };
        for item in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let rendered = if item.contains('(') {
                item.to_string()
            } else if let Some(caps) = alias_re.captures(item) {
                format!(
                    "{} AS {}",
                    self.qualify(&caps[1]),
                    self.dialect.quote_identifier(&strip_quotes(&caps[2]))
                )
            } else {
                self.qualify(item)
            };
            self.select.push(rendered);
        }
        self
    }

    pub fn select_raw(&mut self, expression: &str) -> &mut Self {
        self.select.push(expression.to_string());
        self
    }

    pub(crate) fn select_aggregate(
        &mut self,
        function: &str,
        column: &str,
        alias: Option<&str>,
    ) -> &mut Self {
        let alias = alias.map_or_else(|| strip_quotes(column), strip_quotes);
        let alias = alias.rsplit('.').next().unwrap_or(&alias).to_string();
        let target = if column.trim() == "*" {
            "*".to_string()
        } else {
            self.qualify(column)
        };
        self.select.push(format!(
            "{function}({target}) AS {}",
            self.dialect.quote_identifier(&alias)
        ));
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    // ---- joins ----

    pub fn join(&mut self, table: &str, condition: &str, join_type: &str) -> &mut Self {
        let join = match JoinType::parse(join_type) {
            Ok(j) if self.dialect.supports_join(j) => j,
            Ok(_) => {
                return self.fail(DbError::UnsupportedJoinType(format!(
                    "{join_type} join is not available on {:?}",
                    self.dialect
                )));
            }
            Err(e) => return self.fail(e),
        };

        let target = match regex(&TABLE_ALIAS) {
            Ok(re) => match re.captures(table.trim()) {
                Some(caps) => {
                    let alias = strip_quotes(&caps[2]);
                    let rendered = format!(
                        "{} AS {}",
                        self.sanitize_table(&caps[1]),
                        self.dialect.quote_identifier(&alias)
                    );
                    self.aliases.push(alias);
                    rendered
                }
                None => self.sanitize_table(table),
            },
            Err(e) => return self.fail(e),
        };

        if join == JoinType::Cross {
            self.joins.push(format!("{} {target}", join.keyword()));
            return self;
        }
        match self.join_condition(condition) {
            Ok(on) => self.joins.push(format!("{} {target} ON {on}", join.keyword())),
            Err(e) => {
                self.fail(e);
            }
        }
        self
    }

    fn join_condition(&self, condition: &str) -> DbResult<String> {
        let connector = regex(&JOIN_CONNECTOR)?;
        let comparison = regex(&JOIN_COMPARISON)?;

        let mut out = String::new();
        let mut last = 0;
        let mut pieces = Vec::new();
        for m in connector.find_iter(condition) {
            pieces.push((&condition[last..m.start()], Some(m.as_str().trim().to_ascii_uppercase())));
            last = m.end();
        }
        pieces.push((&condition[last..], None));

        for (piece, conj) in pieces {
            match comparison.captures(piece) {
                Some(caps) => {
                    out.push_str(&self.qualify_if_identifier(&caps[1])?);
                    out.push(' ');
                    out.push_str(&caps[2]);
                    out.push(' ');
                    out.push_str(&self.qualify_if_identifier(&caps[3])?);
                }
                None => out.push_str(piece.trim()),
            }
            if let Some(conj) = conj {
                out.push(' ');
                out.push_str(&conj);
                out.push(' ');
            }
        }
        Ok(out)
    }

    pub fn join_raw(&mut self, sql: &str, params: Vec<RowValues>) -> &mut Self {
        self.joins.push(self.dialect.adopt_raw(sql));
        self.join_params.extend(params);
        self
    }

    // ---- predicates ----

    fn track(&mut self, clause: Clause) -> &mut Predicates {
        match clause {
            Clause::Where => &mut self.wheres,
            Clause::Having => &mut self.havings,
        }
    }

    pub(crate) fn push_predicate(
        &mut self,
        clause: Clause,
        conj: Conj,
        text: &str,
        params: Vec<RowValues>,
    ) -> &mut Self {
        self.track(clause).push(clause, conj, text, params);
        self
    }

    pub(crate) fn open_group(&mut self, clause: Clause, conj: Conj, negate: bool) -> &mut Self {
        self.track(clause).open(clause, conj, negate);
        self
    }

    pub(crate) fn close_group(&mut self, clause: Clause) -> &mut Self {
        if let Err(e) = self.track(clause).close() {
            self.fail(e);
        }
        self
    }

    pub(crate) fn compare(
        &mut self,
        clause: Clause,
        conj: Conj,
        column: &str,
        op: &str,
        value: RowValues,
    ) -> &mut Self {
        let op = match self.dialect.comparison_operator(op) {
            Ok(op) => op,
            Err(e) => return self.fail(e),
        };
        let column = self.qualify(column);
        if value.is_null() {
            match op.as_str() {
                "=" => return self.push_predicate(clause, conj, &format!("{column} IS NULL"), vec![]),
                "!=" | "<>" => {
                    return self.push_predicate(
                        clause,
                        conj,
                        &format!("{column} IS NOT NULL"),
                        vec![],
                    );
                }
                _ => {}
            }
        }
        let text = format!("{column} {op} {}", self.placeholder());
        self.push_predicate(clause, conj, &text, vec![value])
    }

    pub(crate) fn raw_predicate(
        &mut self,
        clause: Clause,
        conj: Conj,
        sql: &str,
        params: Vec<RowValues>,
    ) -> &mut Self {
        let text = self.dialect.adopt_raw(sql);
        self.push_predicate(clause, conj, &text, params)
    }

    pub(crate) fn column_comparison(
        &mut self,
        conj: Conj,
        left: &str,
        op: &str,
        right: &str,
    ) -> &mut Self {
        let op = match self.dialect.comparison_operator(op) {
            Ok(op) => op,
            Err(e) => return self.fail(e),
        };
        let text = format!("{} {op} {}", self.qualify(left), self.qualify(right));
        self.push_predicate(Clause::Where, conj, &text, vec![])
    }

    pub(crate) fn in_list(
        &mut self,
        conj: Conj,
        column: &str,
        values: Vec<RowValues>,
        negate: bool,
    ) -> &mut Self {
        if values.is_empty() {
            let text = if negate { "1 = 1" } else { "1 = 0" };
            return self.push_predicate(Clause::Where, conj, text, vec![]);
        }
        let marks = vec![self.placeholder(); values.len()].join(", ");
        let keyword = if negate { "NOT IN" } else { "IN" };
        let text = format!("{} {keyword} ({marks})", self.qualify(column));
        self.push_predicate(Clause::Where, conj, &text, values)
    }

    pub(crate) fn null_check(&mut self, conj: Conj, column: &str, negate: bool) -> &mut Self {
        let keyword = if negate { "IS NOT NULL" } else { "IS NULL" };
        let text = format!("{} {keyword}", self.qualify(column));
        self.push_predicate(Clause::Where, conj, &text, vec![])
    }

    pub(crate) fn between(
        &mut self,
        conj: Conj,
        column: &str,
        low: RowValues,
        high: RowValues,
    ) -> &mut Self {
        let mark = self.placeholder();
        let text = format!("{} BETWEEN {mark} AND {mark}", self.qualify(column));
        self.push_predicate(Clause::Where, conj, &text, vec![low, high])
    }

    pub(crate) fn like(
        &mut self,
        conj: Conj,
        column: &str,
        value: &str,
        side: LikeSide,
        negate: bool,
    ) -> &mut Self {
        let escaped = value
            .replace('!', "!!")
            .replace('%', "!%")
            .replace('_', "!_");
        let pattern = match side {
            LikeSide::Both => format!("%{escaped}%"),
            LikeSide::Before => format!("%{escaped}"),
            LikeSide::After => format!("{escaped}%"),
            LikeSide::None => escaped,
        };
        let keyword = if negate { "NOT LIKE" } else { "LIKE" };
        let text = format!(
            "{} {keyword} {} ESCAPE '!'",
            self.qualify(column),
            self.placeholder()
        );
        self.push_predicate(Clause::Where, conj, &text, vec![pattern.into()])
    }

    // ---- grouping, ordering, paging ----

    pub fn group_by(&mut self, columns: &str) -> &mut Self {
        for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let rendered = self.qualify(column);
            self.group_by.push(rendered);
        }
        self
    }

    pub fn order_by(&mut self, columns: &str, direction: &str) -> &mut Self {
        let direction = direction.trim().to_ascii_uppercase();
        match direction.as_str() {
            "RANDOM" => {
                self.order_by.push(self.dialect.random_fn().to_string());
            }
            "" | "ASC" | "DESC" => {
                let dir = if direction.is_empty() { "ASC" } else { direction.as_str() };
                for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                    let rendered = format!("{} {dir}", self.qualify(column));
                    self.order_by.push(rendered);
                }
            }
            other => {
                return self.fail(DbError::InvalidInput(format!(
                    "unsupported order direction: {other}"
                )));
            }
        }
        self
    }

    pub fn order_by_raw(&mut self, expression: &str) -> &mut Self {
        self.order_by.push(expression.to_string());
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn for_update(&mut self) -> &mut Self {
        self.lock = true;
        self
    }

    // ---- set data ----

    pub fn set(&mut self, column: &str, value: RowValues) -> &mut Self {
        let column = self.dialect.quote_identifier(&strip_quotes(column));
        let mark = self.placeholder().to_string();
        self.set_data.push((column, mark));
        self.set_params.push(value);
        self
    }

    /// Set a column to an SQL expression, written verbatim.
    pub fn set_raw(&mut self, column: &str, expression: &str) -> &mut Self {
        let column = self.dialect.quote_identifier(&strip_quotes(column));
        self.set_data.push((column, expression.to_string()));
        self
    }

    pub fn set_record(&mut self, record: &Record) -> &mut Self {
        for (column, value) in record.iter() {
            self.set(column, value.clone());
        }
        self
    }

    /// Quoted, unqualified column name for write statements.
    pub(crate) fn write_column(&self, column: &str) -> String {
        self.dialect.quote_identifier(&strip_quotes(column))
    }
}
