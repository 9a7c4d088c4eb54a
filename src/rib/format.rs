//! ASCII RIB value formatting.

/// Format a float like C's `%.{precision}g`.
pub fn format_float(v: f32, precision: u8) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if !v.is_finite() {
        return format!("{}", v);
    }
    let p = precision.clamp(1, 17) as usize;
    let value = f64::from(v);

    // The exponent of the rounded value decides between fixed and scientific.
    let sci = format!("{:.*e}", p - 1, value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return format!("{}", v);
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= p as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.abs())
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Quote a string for ASCII RIB.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float_matches_printf_g() {
        assert_eq!(format_float(0.0, 6), "0");
        assert_eq!(format_float(1.0, 6), "1");
        assert_eq!(format_float(0.1, 6), "0.1");
        assert_eq!(format_float(-2.5, 6), "-2.5");
        assert_eq!(format_float(123456.0, 6), "123456");
        assert_eq!(format_float(1234567.0, 6), "1.23457e+06");
        assert_eq!(format_float(0.0001, 6), "0.0001");
        assert_eq!(format_float(0.00001, 6), "1e-05");
        assert_eq!(format_float(3.14159265, 3), "3.14");
        assert_eq!(format_float(9.99999, 3), "10");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote("c:\\tmp"), "\"c:\\\\tmp\"");
    }
}
