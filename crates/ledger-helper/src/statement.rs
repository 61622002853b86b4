//! Query statement templates.
//!
//! Table and attribute names are interpolated into the statement text; every
//! value is bound through a `?` placeholder and passed separately to
//! [`TransactionExecutor::execute`](crate::TransactionExecutor::execute).

/// Returns a bracketed placeholder list for an `IN` clause.
///
/// `bind_parameters(3)` is `"[?, ?, ?]"`. Zero parameters gives `"[]"`;
/// callers reject empty lists before building a statement.
#[must_use]
pub fn bind_parameters(count: usize) -> String {
    let mut out = String::with_capacity(2 + count.saturating_mul(3));
    out.push('[');
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out.push(']');
    out
}

/// Documents whose attribute equals one bound value.
#[must_use]
pub fn select_by_attribute(table: &str, attribute: &str) -> String {
    format!("SELECT * FROM {table} AS d BY id WHERE d.{attribute} = ?")
}

/// Documents whose attribute is any of `count` bound values.
#[must_use]
pub fn select_by_attributes(table: &str, attribute: &str, count: usize) -> String {
    format!("SELECT * FROM {table} AS d BY id WHERE d.{attribute} IN {}", bind_parameters(count))
}

/// The document with a bound document id.
#[must_use]
pub fn select_by_id(table: &str) -> String {
    format!("SELECT * FROM {table} BY id WHERE id = ?")
}

/// Document ids of documents whose attribute equals one bound value.
#[must_use]
pub fn select_ids_by_attribute(table: &str, attribute: &str) -> String {
    format!("SELECT id FROM {table} AS t BY id WHERE t.{attribute} = ?")
}

/// The history entry for a bound document id at a bound block sequence number.
#[must_use]
pub fn select_history_by_id_and_block(table: &str) -> String {
    format!(
        "SELECT * FROM history( {table} ) AS h WHERE h.metadata.id = ? AND h.blockAddress.sequenceNo = ?"
    )
}

/// Every history entry for a bound document id.
#[must_use]
pub fn select_history_by_id(table: &str) -> String {
    format!("SELECT * FROM history( {table} ) AS h WHERE h.metadata.id = ?")
}
