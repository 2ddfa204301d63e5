use serde::{Deserialize, Serialize};

/// Closed registry of column transforms selected by `{DB_<NAME>}` prefix tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnFn {
    Distinct,
    NoCache,
    HighPriority,
    LowPriority,
    Max,
    Min,
    Sum,
    Count,
    Length,
    Time,
    Timestamp,
    Date,
    Day,
    Month,
    Year,
    Now,
    FromUnixtime,
    FromUnixtimeDate,
}

impl ColumnFn {
    pub const ALL: [ColumnFn; 18] = [
        ColumnFn::Distinct,
        ColumnFn::NoCache,
        ColumnFn::HighPriority,
        ColumnFn::LowPriority,
        ColumnFn::Max,
        ColumnFn::Min,
        ColumnFn::Sum,
        ColumnFn::Count,
        ColumnFn::Length,
        ColumnFn::Time,
        ColumnFn::Timestamp,
        ColumnFn::Date,
        ColumnFn::Day,
        ColumnFn::Month,
        ColumnFn::Year,
        ColumnFn::Now,
        ColumnFn::FromUnixtime,
        ColumnFn::FromUnixtimeDate,
    ];

    /// The token name, without the `{DB_` `}` wrapping.
    pub fn token(&self) -> &'static str {
        match self {
            ColumnFn::Distinct => "DISTINCT",
            ColumnFn::NoCache => "NO_CACHE",
            ColumnFn::HighPriority => "HIGH_PRIORITY",
            ColumnFn::LowPriority => "LOW_PRIORITY",
            ColumnFn::Max => "MAX",
            ColumnFn::Min => "MIN",
            ColumnFn::Sum => "SUM",
            ColumnFn::Count => "COUNT",
            ColumnFn::Length => "LENGTH",
            ColumnFn::Time => "TIME",
            ColumnFn::Timestamp => "TIMESTAMP",
            ColumnFn::Date => "DATE",
            ColumnFn::Day => "DAY",
            ColumnFn::Month => "MONTH",
            ColumnFn::Year => "YEAR",
            ColumnFn::Now => "NOW",
            ColumnFn::FromUnixtime => "FROM_UNIXTIME",
            ColumnFn::FromUnixtimeDate => "FROM_UNIXTIME_DATE",
        }
    }

    pub fn from_token(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.token() == name)
    }
}

/// A column expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Bare, dotted (`t.col`) or comma-separated identifier; `*` is the wildcard.
    Ident(String),
    /// Quoted literal (`'text'`), emitted as an escaped value literal.
    Literal(String),
    /// Transform wrapping an inner expression.
    Func(ColumnFn, Box<Column>),
    /// `{DB_FNC}` raw SQL, emitted unescaped.
    Raw(String),
    /// `{DB_VAL}` literal-value wrapper.
    Value(String),
    /// Unrecognised token name; dropped or rejected depending on strictness.
    Unknown(String),
}

impl Column {
    pub fn ident(name: impl Into<String>) -> Self {
        Column::Ident(name.into())
    }

    pub fn func(f: ColumnFn, inner: impl Into<Column>) -> Self {
        Column::Func(f, Box::new(inner.into()))
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Column::Raw(sql.into())
    }

    pub fn count_all() -> Self {
        Column::func(ColumnFn::Count, Column::ident("*"))
    }

    pub fn sum(inner: impl Into<Column>) -> Self {
        Column::func(ColumnFn::Sum, inner)
    }

    pub fn max(inner: impl Into<Column>) -> Self {
        Column::func(ColumnFn::Max, inner)
    }

    pub fn min(inner: impl Into<Column>) -> Self {
        Column::func(ColumnFn::Min, inner)
    }

    pub fn distinct(inner: impl Into<Column>) -> Self {
        Column::func(ColumnFn::Distinct, inner)
    }

    /// An empty identifier compiles to nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Column::Ident(s) if s.trim().is_empty())
    }
}

impl From<&str> for Column {
    fn from(spec: &str) -> Self {
        crate::parser::parse_column(spec)
    }
}

impl From<String> for Column {
    fn from(spec: String) -> Self {
        crate::parser::parse_column(&spec)
    }
}

impl From<&String> for Column {
    fn from(spec: &String) -> Self {
        crate::parser::parse_column(spec)
    }
}

/// One entry of a column list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub alias: Option<String>,
    pub column: Column,
}

/// Ordered column list; empty means `*`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Columns(pub Vec<SelectItem>);

impl Columns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional (unaliased) entry.
    pub fn col(mut self, column: impl Into<Column>) -> Self {
        self.0.push(SelectItem {
            alias: None,
            column: column.into(),
        });
        self
    }

    pub fn aliased(mut self, alias: impl Into<String>, column: impl Into<Column>) -> Self {
        self.0.push(SelectItem {
            alias: Some(alias.into()),
            column: column.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectItem> {
        self.0.iter()
    }
}

impl From<&str> for Columns {
    fn from(spec: &str) -> Self {
        Columns::new().col(spec)
    }
}

impl From<Column> for Columns {
    fn from(column: Column) -> Self {
        Columns::new().col(column)
    }
}

impl From<Vec<&str>> for Columns {
    fn from(specs: Vec<&str>) -> Self {
        specs.into_iter().fold(Columns::new(), Columns::col)
    }
}

impl<const N: usize> From<[&str; N]> for Columns {
    fn from(specs: [&str; N]) -> Self {
        specs.into_iter().fold(Columns::new(), Columns::col)
    }
}

impl From<Vec<Column>> for Columns {
    fn from(columns: Vec<Column>) -> Self {
        columns.into_iter().fold(Columns::new(), Columns::col)
    }
}
