//! SQL alias and column naming utilities.
//!
//! All alias text emitted by the compiler goes through these functions so that the
//! alias registry, the mapping descriptors and the tests agree on one format.
//!
//! ## Naming Convention
//! - Table alias: `{root}{counter}_` where `root` is derived from an entity name or
//!   collection role (`com.acme.Order` → `order`, `com.acme.Order.items` → `items`)
//! - Subclass/secondary table alias: `{table_alias}{n}_` (`order0_` → `order0_1_`)
//! - Column suffix: `{counter}_`
//! - Column alias: `{column}{suffix}` (`ID` + `1_` → `ID1_`)

/// Maximum length of an alias root before the counter is appended.
pub const ALIAS_TRUNCATE_LENGTH: usize = 10;

/// Placeholder replaced by a table alias in `where`, filter, order-by and with-clause templates.
pub const ALIAS_PLACEHOLDER: &str = "{alias}";

/// Generate a table alias of the form `foo1_` for an entity name or collection role.
///
/// # Examples
/// ```
/// use loadplan::utils::sql_naming::generate_alias;
///
/// assert_eq!(generate_alias("com.acme.Order", 0), "order0_");
/// assert_eq!(generate_alias("com.acme.Order.items", 3), "items3_");
/// ```
pub fn generate_alias(description: &str, unique: u32) -> String {
    format!("{}{}_", generate_alias_root(description), unique)
}

/// Derive the alias root: unqualified, truncated, lower-cased, cleaned.
fn generate_alias_root(description: &str) -> String {
    let truncated: String = unqualify(description)
        .chars()
        .take(ALIAS_TRUNCATE_LENGTH)
        .collect();
    let lowered = truncated
        .to_ascii_lowercase()
        .replace(['/', '$'], "_");
    let mut root = clean_alias(&lowered);
    if root.is_empty() {
        root.push('x');
    }
    // an alias ending in a digit would run into the counter
    if root.chars().last().is_some_and(|c| c.is_ascii_digit()) {
        root.push('x');
    }
    root
}

/// Strip leading characters up to the first letter.
fn clean_alias(alias: &str) -> String {
    match alias.char_indices().find(|(_, c)| c.is_alphabetic()) {
        Some((idx, _)) => alias[idx..].to_string(),
        None => alias.to_string(),
    }
}

/// Everything after the last `.` of a qualified name.
pub fn unqualify(qualified: &str) -> &str {
    match qualified.rfind('.') {
        Some(pos) => &qualified[pos + 1..],
        None => qualified,
    }
}

/// Render a column suffix for the given counter value.
pub fn generate_suffix(unique: u32) -> String {
    format!("{unique}_")
}

/// Alias of the n-th additional table (secondary or subclass table) of an entity.
///
/// Table number 0 is the driving table and keeps the root alias.
pub fn generate_table_alias(root_alias: &str, table_number: usize) -> String {
    if table_number == 0 {
        return root_alias.to_string();
    }
    let mut alias = root_alias.to_string();
    if !alias.ends_with('_') {
        alias.push('_');
    }
    alias.push_str(&table_number.to_string());
    alias.push('_');
    alias
}

/// Qualify each column with a table alias: `ID` → `a0_.ID`.
pub fn qualify(alias: &str, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|column| format!("{alias}.{column}"))
        .collect()
}

/// Column alias used in SELECT fragments and by result readers.
pub fn column_alias(column: &str, suffix: &str) -> String {
    format!("{column}{suffix}")
}

/// Replace every `{alias}` placeholder of a condition or ordering template.
pub fn render_alias_template(template: &str, alias: &str) -> String {
    template.replace(ALIAS_PLACEHOLDER, alias)
}
