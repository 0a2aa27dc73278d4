//! PostgreSQL type OIDs and the text-format renderings the statement API needs.

/// Well-known PostgreSQL type OIDs.
pub mod oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const CHAR: u32 = 18;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const VARCHAR: u32 = 1043;
    pub const NUMERIC: u32 = 1700;
}

/// Render a text-format column value as a machine integer.
///
/// Booleans map to 1/0. Everything else takes the longest leading integer
/// of its text form, so `"12abc"` is 12, `"3.7"` is 3 and `"abc"` is 0.
/// Values beyond the `i64` range saturate.
pub fn text_to_integer(type_oid: u32, data: &[u8]) -> i64 {
    if type_oid == oid::BOOL {
        return matches!(data, b"t" | b"true" | b"1") as i64;
    }
    leading_integer(data)
}

fn leading_integer(data: &[u8]) -> i64 {
    let mut bytes = data
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    for &b in bytes.take_while(|b| b.is_ascii_digit()) {
        let digit = (b - b'0') as i64;
        value = if negative {
            value.saturating_mul(10).saturating_sub(digit)
        } else {
            value.saturating_mul(10).saturating_add(digit)
        };
    }
    value
}

/// Human-readable name for a type OID, used in column metadata and logs.
pub fn type_name(type_oid: u32) -> &'static str {
    match type_oid {
        oid::BOOL => "BOOL",
        oid::BYTEA => "BYTEA",
        oid::CHAR => "CHAR",
        oid::INT8 => "INT8",
        oid::INT2 => "INT2",
        oid::INT4 => "INT4",
        oid::TEXT => "TEXT",
        oid::OID => "OID",
        oid::FLOAT4 => "FLOAT4",
        oid::FLOAT8 => "FLOAT8",
        oid::VARCHAR => "VARCHAR",
        oid::NUMERIC => "NUMERIC",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_rendering() {
        assert_eq!(text_to_integer(oid::INT4, b"52642"), 52642);
        assert_eq!(text_to_integer(oid::INT8, b"-17"), -17);
        assert_eq!(text_to_integer(oid::TEXT, b"  12abc"), 12);
        assert_eq!(text_to_integer(oid::NUMERIC, b"3.7"), 3);
        assert_eq!(text_to_integer(oid::TEXT, b"Audi"), 0);
        assert_eq!(text_to_integer(oid::TEXT, b""), 0);
    }

    #[test]
    fn test_boolean_rendering() {
        assert_eq!(text_to_integer(oid::BOOL, b"t"), 1);
        assert_eq!(text_to_integer(oid::BOOL, b"f"), 0);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(oid::INT4), "INT4");
        assert_eq!(type_name(oid::TEXT), "TEXT");
        assert_eq!(type_name(0), "UNKNOWN");
    }

    #[test]
    fn test_integer_rendering_saturates() {
        assert_eq!(text_to_integer(oid::NUMERIC, b"99999999999999999999"), i64::MAX);
        assert_eq!(text_to_integer(oid::NUMERIC, b"-99999999999999999999"), i64::MIN);
    }
}
