/// Field count upper bound for a single record shape.
pub const MAX_FIELD_COUNT: usize = 1024;

/// Names a schema may not use for its own fields. `time` is the column name
/// the server assigns to timestamps in query responses.
pub const RESERVED_FIELD_NAMES: [&str; 1] = ["time"];

/// Validate a schema field name.
///
/// - ASCII letters, digits and underscores
/// - must not start with a digit
/// - length 1..=128
pub fn validate_field_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 128 {
        return false;
    }

    let first_char = name.chars().next().unwrap();
    if first_char.is_ascii_digit() {
        return false;
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return false;
        }
    }

    true
}

/// Validate a schema (measurement) name. Free-form UTF-8 apart from line
/// breaks, which the wire format cannot carry.
pub fn validate_schema_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('\n') && !name.contains('\r')
}

#[cfg(test)]
mod test_rules {
    use super::*;

    #[test]
    fn test_field_name() {
        assert!(validate_field_name("value"));
        assert!(validate_field_name("cpu_load_1"));
        assert!(validate_field_name("_private"));
        assert!(!validate_field_name(""));
        assert!(!validate_field_name("1st"));
        assert!(!validate_field_name("has space"));
        assert!(!validate_field_name(&"x".repeat(129)));
    }

    #[test]
    fn test_schema_name() {
        assert!(validate_schema_name("cpu load,metrics"));
        assert!(!validate_schema_name(""));
        assert!(!validate_schema_name("a\nb"));
    }
}
