//! Reload subjects.
//!
//! A subscription for project `p` under root `reload` listens on
//! `reload.p` (everything) and `reload.p.>` (one field). The field key is
//! whatever follows the prefix and one separator, and may itself contain
//! dots (`reload.p.a.b.c` targets field `a.b.c`).

/// What a reload message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadTarget {
    All,
    Field(String),
}

/// Reduce `subject` to a target relative to `prefix`.
///
/// Strips the prefix, then one leading `.` or `/`; the rest is the field
/// key. Nothing left (with or without the separator) means a full reload.
/// Returns `None` when `subject` does not belong to `prefix`.
pub fn parse_reload_subject(prefix: &str, subject: &str) -> Option<ReloadTarget> {
    let rest = subject.strip_prefix(prefix)?;
    if rest.is_empty() {
        return Some(ReloadTarget::All);
    }

    let field = rest.strip_prefix('.').or_else(|| rest.strip_prefix('/'))?;
    if field.is_empty() {
        Some(ReloadTarget::All)
    } else {
        Some(ReloadTarget::Field(field.to_string()))
    }
}

/// `<root>.<project>`
pub fn project_subject(root: &str, project: &str) -> String {
    format!("{}.{}", root, project)
}

/// Subject that triggers a reload of `field`, or of everything.
pub fn reload_subject(root: &str, project: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("{}.{}.{}", root, project, field),
        None => project_subject(root, project),
    }
}
