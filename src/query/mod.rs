//! Backend-neutral select query over an entity base table.
//!
//! Each builder method consumes the query and returns the next state, so exactly one
//! stage owns the query at a time.

mod builder;

pub use builder::{
    BuiltQuery, IdentifierSet, QueryBuilder, MAX_WINDOW, PARAM_LIMIT, PARAM_ORDERBY, PARAM_SORT, PARAM_START,
};

use crate::store::{EntityInfo, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column qualified by the alias of the table it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnRef {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "in", alias = "IN")]
    In,
    #[serde(rename = "not in", alias = "NOT IN")]
    NotIn,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>", alias = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "like", alias = "LIKE")]
    Like,
}

impl Operator {
    /// Negated form used for `!`-prefixed filter values. Only membership and equality negate.
    pub fn negated(self) -> Option<Operator> {
        match self {
            Operator::In => Some(Operator::NotIn),
            Operator::NotIn => Some(Operator::In),
            Operator::Eq => Some(Operator::Ne),
            Operator::Ne => Some(Operator::Eq),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub column: ColumnRef,
    pub operator: Operator,
    pub values: Vec<String>,
    /// Declared type of the column; values are compared as text when unset.
    #[serde(default)]
    pub value_type: Option<ValueType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub table: String,
    pub alias: String,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("invalid sort direction '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub entity_type: String,
    pub base_table: String,
    pub id_key: String,
    pub joins: Vec<Join>,
    pub conditions: Vec<Condition>,
    pub order_by: Vec<OrderBy>,
    pub range: Option<Range>,
}

impl Query {
    /// Select identifiers from the entity's base table, aliased by the table name.
    pub fn select(info: &EntityInfo) -> Self {
        Query {
            entity_type: info.entity_type.clone(),
            base_table: info.base_table.clone(),
            id_key: info.id_key.clone(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            range: None,
        }
    }

    pub fn base_column(&self, column: &str) -> ColumnRef {
        ColumnRef::new(self.base_table.clone(), column)
    }

    pub fn id_column(&self) -> ColumnRef {
        self.base_column(&self.id_key)
    }

    pub fn condition(self, column: ColumnRef, operator: Operator, values: Vec<String>) -> Self {
        self.typed_condition(column, operator, values, None)
    }

    pub fn typed_condition(
        mut self,
        column: ColumnRef,
        operator: Operator,
        values: Vec<String>,
        value_type: Option<ValueType>,
    ) -> Self {
        self.conditions.push(Condition {
            column,
            operator,
            values,
            value_type,
        });
        self
    }

    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|j| j.alias == alias)
    }

    /// Inner join; a second join under an alias already present is a no-op.
    pub fn join(mut self, table: &str, alias: &str, left: ColumnRef, right: ColumnRef) -> Self {
        if !self.has_join(alias) {
            self.joins.push(Join {
                table: table.to_string(),
                alias: alias.to_string(),
                left,
                right,
            });
        }
        self
    }

    /// Join a storage table whose `entity_id` column references the base identifier.
    pub fn join_entity_table(self, table: &str, alias: &str) -> Self {
        let left = ColumnRef::new(alias, "entity_id");
        let right = self.id_column();
        self.join(table, alias, left, right)
    }

    pub fn order_by(mut self, column: ColumnRef, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy { column, direction });
        self
    }

    pub fn range(mut self, offset: u64, limit: u64) -> Self {
        self.range = Some(Range { offset, limit });
        self
    }

    /// Same joins and conditions without ordering or range.
    pub fn count_query(&self) -> Query {
        Query {
            order_by: Vec::new(),
            range: None,
            ..self.clone()
        }
    }
}
