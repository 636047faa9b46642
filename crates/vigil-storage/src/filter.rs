//! Predicate trees over open problems, rendered as parameterized SQL.
//!
//! Rendered fragments refer to the problem row as `p`.

use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    /// The problem has a tag with this name.
    HasTag(String),
    /// The problem has a tag with this name whose value is equal to, or
    /// with `substring` set contains, the given value. Both comparisons are
    /// case-sensitive, like `ConditionOperator::matches`.
    TagValue {
        tag: String,
        value: String,
        substring: bool,
    },
    /// The problem has a tag with this name and one of the values.
    TagValueIn { tag: String, values: Vec<String> },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Appends the SQL text of this predicate to `sql` and its bound values
    /// to `params`.
    ///
    /// ```
    /// use vigil_storage::Predicate;
    ///
    /// let mut sql = String::new();
    /// let mut params = Vec::new();
    /// Predicate::And(vec![Predicate::Const(true), Predicate::HasTag("service".into())])
    ///     .render(&mut sql, &mut params);
    /// assert_eq!(
    ///     sql,
    ///     "(1=1 and exists (select null from problem_tag pt where p.eventid=pt.eventid and pt.tag=?))"
    /// );
    /// assert_eq!(params.len(), 1);
    /// ```
    pub fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Predicate::Const(true) => sql.push_str("1=1"),
            Predicate::Const(false) => sql.push_str("0=1"),
            Predicate::HasTag(tag) => {
                sql.push_str(
                    "exists (select null from problem_tag pt where p.eventid=pt.eventid and pt.tag=?)",
                );
                params.push(Value::Text(tag.clone()));
            }
            Predicate::TagValue {
                tag,
                value,
                substring,
            } => {
                sql.push_str(
                    "exists (select null from problem_tag pt where p.eventid=pt.eventid and pt.tag=?",
                );
                if *substring {
                    // LIKE would fold ASCII case
                    sql.push_str(" and instr(pt.value,?)>0)");
                } else {
                    sql.push_str(" and pt.value=?)");
                }
                params.push(Value::Text(tag.clone()));
                params.push(Value::Text(value.clone()));
            }
            Predicate::TagValueIn { tag, values } => {
                if values.is_empty() {
                    sql.push_str("0=1");
                    return;
                }
                sql.push_str(
                    "exists (select null from problem_tag pt where p.eventid=pt.eventid and pt.tag=? and pt.value in (",
                );
                sql.push_str(&crate::placeholders(values.len()));
                sql.push_str("))");
                params.push(Value::Text(tag.clone()));
                params.extend(values.iter().map(|v| Value::Text(v.clone())));
            }
            Predicate::Not(inner) => {
                sql.push_str("not ");
                inner.render_grouped(sql, params);
            }
            Predicate::And(items) => Self::render_list(items, " and ", true, sql, params),
            Predicate::Or(items) => Self::render_list(items, " or ", false, sql, params),
        }
    }

    fn render_grouped(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Predicate::And(_) | Predicate::Or(_) => self.render(sql, params),
            _ => {
                sql.push('(');
                self.render(sql, params);
                sql.push(')');
            }
        }
    }

    fn render_list(
        items: &[Predicate],
        separator: &str,
        empty: bool,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        if items.is_empty() {
            Predicate::Const(empty).render(sql, params);
            return;
        }
        sql.push('(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                sql.push_str(separator);
            }
            item.render(sql, params);
        }
        sql.push(')');
    }
}
