use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use wharf_core::{error::WharfError, WharfResult};
use wharf_db::{repository::FieldMatch, DbError};

/// Filterable fields and the lookups each accepts; the first field name is listed in errors.
pub type FilterFields = &'static [(&'static str, &'static [&'static str])];

/// Runs blocking work (archive extraction, hashing, database writes) off the async runtime.
pub async fn blocking<F, T>(f: F) -> WharfResult<T>
where
    F: FnOnce() -> WharfResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| WharfError::Custom(format!("blocking task failed: {err}")))?
}

/// Turns a unique-constraint failure into a readable conflict for `kind` `name`.
pub fn already_exists(err: WharfError, kind: &str, name: &str) -> WharfError {
    match err {
        WharfError::Database(ref db) if db.is_conflict() => {
            WharfError::Conflict(format!("{kind} '{name}' already exists"))
        }
        other => other,
    }
}

/// Rejects empty or whitespace-padded record names.
pub fn validate_name(field: &str, name: &str) -> WharfResult<()> {
    if name.is_empty() {
        return Err(WharfError::invalid_field(field, "This field may not be blank."));
    }
    if name.trim() != name || name.contains(char::is_whitespace) {
        return Err(WharfError::invalid_field(
            field,
            format!("`{name}` must not contain whitespace."),
        ));
    }
    if name.contains(':') {
        return Err(WharfError::invalid_field(
            field,
            format!("`{name}` must not contain `:`."),
        ));
    }
    Ok(())
}

/// Splits `field[__lookup]=value`, checking `field` and `lookup` against `fields`.
///
/// Without a lookup, `exact` is used.
pub fn parse_filter<'a>(
    expr: &'a str,
    fields: FilterFields,
) -> WharfResult<(&'a str, &'a str, &'a str)> {
    let (key, value) = expr.split_once('=').ok_or_else(|| {
        WharfError::InvalidRequest(format!("`{expr}` is not of the form field=value"))
    })?;
    let (field, lookup) = key.split_once("__").unwrap_or((key, "exact"));

    let Some((_, lookups)) = fields.iter().find(|(name, _)| *name == field) else {
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        return Err(WharfError::InvalidRequest(format!(
            "cannot filter on `{field}`; filterable fields are {}",
            names.join(", ")
        )));
    };
    if !lookups.contains(&lookup) {
        return Err(WharfError::InvalidRequest(format!(
            "`{lookup}` is not supported for `{field}`; use one of {}",
            lookups.join(", ")
        )));
    }
    Ok((field, lookup, value))
}

/// Comma separated values of an `in` or `range` lookup, blanks dropped.
pub fn split_values(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

/// Text predicate for an `exact`, `in` or `contains` lookup.
pub fn field_match(lookup: &str, value: &str) -> FieldMatch {
    match lookup {
        "in" => FieldMatch::In(split_values(value).into_iter().map(str::to_string).collect()),
        "contains" => FieldMatch::Contains(value.to_string()),
        _ => FieldMatch::Exact(value.to_string()),
    }
}

/// Normalizes an RFC 3339 timestamp or a `YYYY-MM-DD` date (midnight UTC) to the stored
/// `YYYY-MM-DDTHH:MM:SSZ` form.
pub fn parse_timestamp(field: &str, value: &str) -> WharfResult<String> {
    let at = match DateTime::parse_from_rfc3339(value) {
        Ok(at) => at.with_timezone(&Utc),
        Err(_) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|at| at.and_utc())
            .ok_or_else(|| {
                WharfError::InvalidRequest(format!(
                    "`{value}` is not a valid timestamp for `{field}`; use RFC 3339 or YYYY-MM-DD"
                ))
            })?,
    };
    Ok(at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: FilterFields = &[("name", &["exact", "in"]), ("title", &["contains"])];

    #[test]
    fn test_parse_filter() {
        assert_eq!(parse_filter("name=a", FIELDS).unwrap(), ("name", "exact", "a"));
        assert_eq!(
            parse_filter("name__in=a,b=c", FIELDS).unwrap(),
            ("name", "in", "a,b=c")
        );
        for bad in ["name", "size=1", "name__contains=a", "title=x"] {
            assert!(
                matches!(parse_filter(bad, FIELDS), Err(WharfError::InvalidRequest(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_field_match() {
        assert_eq!(
            field_match("in", " a, ,b "),
            FieldMatch::In(vec!["a".into(), "b".into()])
        );
        assert_eq!(field_match("contains", "x"), FieldMatch::Contains("x".into()));
        assert_eq!(field_match("exact", "x"), FieldMatch::Exact("x".into()));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("at", "2025-03-04T05:06:07+02:00").unwrap(),
            "2025-03-04T03:06:07Z"
        );
        assert_eq!(
            parse_timestamp("at", "2025-03-04").unwrap(),
            "2025-03-04T00:00:00Z"
        );
        assert!(parse_timestamp("at", "yesterday").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "pypi").is_ok());
        assert!(validate_name("name", "pypi-mirror.2").is_ok());
        for bad in ["", " pypi", "py pi", "repo:x"] {
            let err = validate_name("name", bad).unwrap_err();
            assert_eq!(err.field_errors()[0].field, "name");
        }
    }

    #[test]
    fn test_already_exists_only_rewrites_conflicts() {
        let conflict = WharfError::Database(DbError::Conflict("UNIQUE".into()));
        assert!(matches!(
            already_exists(conflict, "Repository", "pypi"),
            WharfError::Conflict(msg) if msg == "Repository 'pypi' already exists"
        ));

        let other = already_exists(WharfError::Custom("x".into()), "Repository", "pypi");
        assert!(matches!(other, WharfError::Custom(_)));
    }
}
