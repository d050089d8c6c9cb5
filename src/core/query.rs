//! Offline-store join query assembly
//!
//! The offline side of a feature group is a plain table in the managed query
//! engine. Joining two groups is the one piece of SQL this tool writes
//! itself; everything else about query execution is remote.

use crate::core::record::FeatureGroupConfig;
use anyhow::Result;

/// A table participating in a join
#[derive(Debug, Clone)]
pub struct TableRef {
    pub table: String,
    pub columns: Vec<String>,
}

impl TableRef {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }
}

/// An inner join of two offline tables on a shared key
#[derive(Debug, Clone)]
pub struct JoinQuery {
    left: TableRef,
    right: TableRef,
    join_key: String,
}

impl JoinQuery {
    /// Build a join; the key must be a column of both tables
    pub fn new(left: TableRef, right: TableRef, join_key: impl Into<String>) -> Result<Self> {
        let join_key = join_key.into();
        for side in [&left, &right] {
            if !side.columns.iter().any(|c| c == &join_key) {
                anyhow::bail!(
                    "Join key '{}' is not a column of table '{}'",
                    join_key,
                    side.table
                );
            }
        }
        Ok(Self {
            left,
            right,
            join_key,
        })
    }

    /// Build a join over the offline tables of two feature groups
    pub fn for_groups(
        left: &FeatureGroupConfig,
        right: &FeatureGroupConfig,
        join_key: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            TableRef::new(left.offline_table_name(), left.column_names()),
            TableRef::new(right.offline_table_name(), right.column_names()),
            join_key,
        )
    }

    /// Render the query
    ///
    /// Left columns keep their names. Right columns drop the join key (it is
    /// already selected) and colliding names get the right table's name as a
    /// prefix so the projection stays unambiguous.
    pub fn build(&self) -> String {
        let mut select = Vec::new();

        for column in &self.left.columns {
            select.push(format!("\"l\".\"{}\" AS \"{}\"", column, column));
        }

        for column in &self.right.columns {
            if column == &self.join_key {
                continue;
            }
            if self.left.columns.contains(column) {
                select.push(format!(
                    "\"r\".\"{}\" AS \"{}_{}\"",
                    column, self.right.table, column
                ));
            } else {
                select.push(format!("\"r\".\"{}\" AS \"{}\"", column, column));
            }
        }

        format!(
            "SELECT {}\nFROM \"{}\" AS \"l\"\nJOIN \"{}\" AS \"r\"\nON \"l\".\"{}\" = \"r\".\"{}\"",
            select.join(", "),
            self.left.table,
            self.right.table,
            self.join_key,
            self.join_key
        )
    }
}
