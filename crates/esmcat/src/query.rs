//! Query engine: per-column criteria evaluated against the inventory table

use crate::error::Result;
use crate::table::InventoryTable;
use crate::value::{Cell, Value};
use diagnostics::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Criterion for a single column
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Exact match
    Literal(Value),
    /// Shell-style wildcard (`*`, `?`) matched against the whole string
    Glob(String),
    /// Regular expression searched anywhere in the string
    Pattern(Regex),
    /// Matches when any alternative matches
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    pub fn glob<S: Into<String>>(pattern: S) -> Self {
        Predicate::Glob(pattern.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(Predicate::Pattern(Regex::new(pattern)?))
    }

    pub fn any_of<I, P>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        Predicate::AnyOf(alternatives.into_iter().map(Into::into).collect())
    }

    /// Literal values named by this predicate, flattened through `AnyOf`
    pub fn literals(&self) -> Vec<&Value> {
        match self {
            Predicate::Literal(v) => vec![v],
            Predicate::AnyOf(alternatives) => alternatives.iter().flat_map(Predicate::literals).collect(),
            Predicate::Glob(_) | Predicate::Pattern(_) => Vec::new(),
        }
    }

    fn compile(&self) -> Result<Vec<Matcher>> {
        match self {
            Predicate::Literal(v) => Ok(vec![Matcher::Exact(v.clone())]),
            Predicate::Glob(pattern) => Ok(vec![Matcher::Regex(Regex::new(&glob_to_regex(pattern))?)]),
            Predicate::Pattern(re) => Ok(vec![Matcher::Regex(re.clone())]),
            Predicate::AnyOf(alternatives) => {
                let mut out = Vec::new();
                for alt in alternatives {
                    out.extend(alt.compile()?);
                }
                Ok(out)
            }
        }
    }
}

/// True when `text` holds a wildcard character that is not backslash-escaped
fn looks_like_pattern(text: &str) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '*' | '?' | '^' | '$' => return true,
            _ => {}
        }
    }
    false
}

/// Translate a shell wildcard into an anchored regular expression
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(next) => out.push_str(&regex::escape(&next.to_string())),
                None => out.push_str(&regex::escape("\\")),
            },
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

impl From<&str> for Predicate {
    /// Strings with unescaped `*`, `?`, `^` or `$` are treated as regular
    /// expressions; anything else, including invalid expressions, is a literal.
    fn from(s: &str) -> Self {
        if looks_like_pattern(s) {
            if let Ok(re) = Regex::new(s) {
                return Predicate::Pattern(re);
            }
        }
        Predicate::Literal(Value::from(s))
    }
}

impl From<String> for Predicate {
    fn from(s: String) -> Self {
        Predicate::from(s.as_str())
    }
}

impl From<Value> for Predicate {
    fn from(v: Value) -> Self {
        Predicate::Literal(v)
    }
}

impl From<Regex> for Predicate {
    fn from(re: Regex) -> Self {
        Predicate::Pattern(re)
    }
}

impl From<i64> for Predicate {
    fn from(v: i64) -> Self {
        Predicate::Literal(Value::Int(v))
    }
}

impl From<i32> for Predicate {
    fn from(v: i32) -> Self {
        Predicate::Literal(Value::Int(v.into()))
    }
}

impl From<f64> for Predicate {
    fn from(v: f64) -> Self {
        Predicate::Literal(Value::Float(v))
    }
}

impl From<bool> for Predicate {
    fn from(v: bool) -> Self {
        Predicate::Literal(Value::Bool(v))
    }
}

impl<T: Into<Predicate>> From<Vec<T>> for Predicate {
    fn from(values: Vec<T>) -> Self {
        Predicate::any_of(values)
    }
}

impl<T: Into<Predicate>, const N: usize> From<[T; N]> for Predicate {
    fn from(values: [T; N]) -> Self {
        Predicate::any_of(values)
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(Value),
    Regex(Regex),
}

impl Matcher {
    fn matches_value(&self, value: &Value) -> bool {
        match self {
            Matcher::Exact(expected) => values_equal(expected, value),
            Matcher::Regex(re) => value.as_str().is_some_and(|s| re.is_match(s)),
        }
    }

    /// Existential over the elements of a set cell
    fn matches_cell(&self, cell: &Cell) -> bool {
        match cell {
            Cell::Scalar(v) => self.matches_value(v),
            Cell::Set(values) => values.iter().any(|v| self.matches_value(v)),
        }
    }
}

/// Equality that treats `Int(1)` and `Float(1.0)` as the same number
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => (*i as f64) == *f,
        _ => a == b,
    }
}

/// Column criteria plus an optional completeness constraint
#[derive(Debug, Clone, Default)]
pub struct Query {
    criteria: Vec<(String, Predicate)>,
    require_all_on: Vec<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the criterion for `column`
    #[must_use]
    pub fn with<C: Into<String>, P: Into<Predicate>>(mut self, column: C, predicate: P) -> Self {
        self.insert(column, predicate);
        self
    }

    pub fn insert<C: Into<String>, P: Into<Predicate>>(&mut self, column: C, predicate: P) {
        let column = column.into();
        let predicate = predicate.into();
        match self.criteria.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = predicate,
            None => self.criteria.push((column, predicate)),
        }
    }

    /// Keep only groups (by these columns) that satisfy every requested
    /// combination of the other criteria
    #[must_use]
    pub fn require_all_on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_all_on = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn criteria(&self) -> &[(String, Predicate)] {
        &self.criteria
    }

    pub fn required_columns(&self) -> &[String] {
        &self.require_all_on
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.criteria.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&Predicate> {
        self.criteria.iter().find(|(name, _)| name == column).map(|(_, p)| p)
    }

    pub fn remove(&mut self, column: &str) -> Option<Predicate> {
        let idx = self.criteria.iter().position(|(name, _)| name == column)?;
        Some(self.criteria.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Criteria of `self` overridden by those of `other`
    #[must_use]
    pub fn merge(&self, other: &Query) -> Query {
        let mut merged = self.clone();
        for (column, predicate) in &other.criteria {
            merged.insert(column.clone(), predicate.clone());
        }
        merged
    }
}

/// Matching rows of a search, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    table: InventoryTable,
}

impl QueryResult {
    pub fn new(table: InventoryTable) -> Self {
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn table(&self) -> &InventoryTable {
        &self.table
    }

    pub fn into_table(self) -> InventoryTable {
        self.table
    }
}

/// Filter `table` by `query`.
///
/// Criteria on different columns are ANDed; alternatives within a column are
/// ORed. A query naming a column the table does not have matches nothing.
pub fn search(table: &InventoryTable, query: &Query) -> Result<QueryResult> {
    if query.is_empty() {
        return Ok(QueryResult::new(table.clone()));
    }

    let unknown: Vec<&str> = query
        .columns()
        .chain(query.required_columns().iter().map(String::as_str))
        .filter(|c| !table.has_column(c))
        .collect();
    if !unknown.is_empty() {
        let unknown = unknown.join(", ");
        warn!("search references unknown columns {unknown}; no rows match", unknown: unknown);
        return Ok(QueryResult::new(table.select(&[])));
    }

    let mut compiled: Vec<(usize, Vec<Matcher>)> = Vec::with_capacity(query.criteria.len());
    for (column, predicate) in &query.criteria {
        if let Some(col) = table.column_index(column) {
            compiled.push((col, predicate.compile()?));
        }
    }

    let rows = table.raw_rows();
    let matched: Vec<usize> = (0..rows.len())
        .filter(|&i| {
            compiled
                .iter()
                .all(|(col, matchers)| matchers.iter().any(|m| m.matches_cell(&rows[i][*col])))
        })
        .collect();
    let matched_count = matched.len();
    debug!("search matched {matched_count} rows", matched_count: matched_count);

    let kept = if query.require_all_on.is_empty() {
        matched
    } else {
        apply_require_all_on(table, &matched, query, &compiled)
    };

    if kept.is_empty() {
        warn!("query returned zero results");
    }
    Ok(QueryResult::new(table.select(&kept)))
}

/// Keep the groups of `matched` (keyed by the require-all-on columns) whose
/// rows cover every combination of the remaining criteria.
fn apply_require_all_on(
    table: &InventoryTable,
    matched: &[usize],
    query: &Query,
    compiled: &[(usize, Vec<Matcher>)],
) -> Vec<usize> {
    let rows = table.raw_rows();
    let group_cols: Vec<usize> = query
        .require_all_on
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    let others: Vec<&(usize, Vec<Matcher>)> = compiled
        .iter()
        .filter(|(col, _)| !group_cols.contains(col))
        .collect();

    let mut order: Vec<Vec<&Cell>> = Vec::new();
    let mut groups: HashMap<Vec<&Cell>, Vec<usize>> = HashMap::new();
    for &i in matched {
        let key: Vec<&Cell> = group_cols.iter().map(|&c| &rows[i][c]).collect();
        // Rows without a group value belong to no group.
        if key.iter().any(|cell| cell.is_null()) {
            continue;
        }
        let members = groups.entry(key.clone()).or_default();
        if members.is_empty() {
            order.push(key);
        }
        members.push(i);
    }

    let mut kept_groups: HashSet<Vec<&Cell>> = HashSet::new();
    for key in order {
        let members = &groups[&key];
        let complete = covers_all_combinations(members, &others, rows);
        let member_count = members.len();
        let group = key.iter().map(|c| c.to_string()).collect::<Vec<_>>().join("/");
        if complete {
            debug!("require_all_on kept group {group} with {member_count} rows", group: group, member_count: member_count);
            kept_groups.insert(key);
        } else {
            debug!("require_all_on dropped incomplete group {group}", group: group);
        }
    }

    matched
        .iter()
        .copied()
        .filter(|&i| {
            let key: Vec<&Cell> = group_cols.iter().map(|&c| &rows[i][c]).collect();
            kept_groups.contains(&key)
        })
        .collect()
}

/// True when, for every choice of one alternative per column, some member
/// row satisfies all chosen alternatives at once
fn covers_all_combinations(members: &[usize], others: &[&(usize, Vec<Matcher>)], rows: &[Vec<Cell>]) -> bool {
    if others.iter().any(|(_, matchers)| matchers.is_empty()) {
        return false;
    }

    let mut choice = vec![0usize; others.len()];
    loop {
        let satisfied = members.iter().any(|&i| {
            others
                .iter()
                .zip(&choice)
                .all(|((col, matchers), &pick)| matchers[pick].matches_cell(&rows[i][*col]))
        });
        if !satisfied {
            return false;
        }

        // Advance the odometer; done once every position wraps.
        let mut pos = 0;
        loop {
            if pos == choice.len() {
                return true;
            }
            choice[pos] += 1;
            if choice[pos] < others[pos].1.len() {
                break;
            }
            choice[pos] = 0;
            pos += 1;
        }
    }
}
