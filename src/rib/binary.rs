//! Binary RIB token encoding.
//!
//! Every value is prefixed by a one-byte code; multi-byte quantities are
//! big-endian. Requests and parameter-name strings are defined once with an
//! index and referenced by that index afterwards.

use std::io::{self, Write};

use byteorder::{BigEndian, WriteBytesExt};

/// Encoded integer, `0o200 + (bytes - 1)`.
pub const INT: u8 = 0o200;
/// Encoded string shorter than 16 bytes, `0o220 + len`.
pub const SHORT_STRING: u8 = 0o220;
/// Encoded string with a length prefix, `0o240 + (length bytes - 1)`.
pub const LONG_STRING: u8 = 0o240;
/// IEEE single float.
pub const FLOAT: u8 = 0o244;
/// Request reference by index.
pub const REQUEST: u8 = 0o246;
/// Float array with a length prefix, `0o310 + (length bytes - 1)`.
pub const FLOAT_ARRAY: u8 = 0o310;
/// Request definition: index followed by the request name.
pub const DEFINE_REQUEST: u8 = 0o314;
/// String token definition, `0o315 + (index bytes - 1)`.
pub const DEFINE_STRING: u8 = 0o315;
/// String token reference, `0o317 + (index bytes - 1)`.
pub const INTERPOLATE_STRING: u8 = 0o317;

/// Bytes needed to hold an unsigned length (1..=4).
fn length_bytes(n: usize) -> usize {
    match n {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xff_ffff => 3,
        _ => 4,
    }
}

fn put_length<W: Write>(w: &mut W, n: usize, bytes: usize) -> io::Result<()> {
    let be = (n as u32).to_be_bytes();
    w.write_all(&be[4 - bytes..])
}

/// Integer in the fewest two's-complement bytes.
pub fn put_int<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    let bytes = match v {
        -0x80..=0x7f => 1,
        -0x8000..=0x7fff => 2,
        -0x80_0000..=0x7f_ffff => 3,
        _ => 4,
    };
    w.write_u8(INT + (bytes - 1) as u8)?;
    w.write_all(&v.to_be_bytes()[4 - bytes..])
}

/// Single float.
pub fn put_float<W: Write>(w: &mut W, v: f32) -> io::Result<()> {
    w.write_u8(FLOAT)?;
    w.write_f32::<BigEndian>(v)
}

/// String literal.
pub fn put_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let len = s.len();
    if len < 16 {
        w.write_u8(SHORT_STRING + len as u8)?;
    } else {
        let bytes = length_bytes(len);
        w.write_u8(LONG_STRING + (bytes - 1) as u8)?;
        put_length(w, len, bytes)?;
    }
    w.write_all(s.as_bytes())
}

/// Float array with its element count.
pub fn put_float_array<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    let bytes = length_bytes(values.len());
    w.write_u8(FLOAT_ARRAY + (bytes - 1) as u8)?;
    put_length(w, values.len(), bytes)?;
    for v in values {
        w.write_f32::<BigEndian>(*v)?;
    }
    Ok(())
}

/// Integer array, bracketed.
pub fn put_int_array<W: Write>(w: &mut W, values: &[i32]) -> io::Result<()> {
    w.write_u8(b'[')?;
    for v in values {
        put_int(w, *v)?;
    }
    w.write_u8(b']')
}

/// String array, bracketed.
pub fn put_string_array<W: Write, S: AsRef<str>>(w: &mut W, values: &[S]) -> io::Result<()> {
    w.write_u8(b'[')?;
    for v in values {
        put_string(w, v.as_ref())?;
    }
    w.write_u8(b']')
}

/// Bind request `name` to `code`.
pub fn put_define_request<W: Write>(w: &mut W, code: u8, name: &str) -> io::Result<()> {
    w.write_u8(DEFINE_REQUEST)?;
    w.write_u8(code)?;
    put_string(w, name)
}

/// Invoke a previously defined request.
pub fn put_request<W: Write>(w: &mut W, code: u8) -> io::Result<()> {
    w.write_u8(REQUEST)?;
    w.write_u8(code)
}

fn put_index<W: Write>(w: &mut W, base: u8, index: u16) -> io::Result<()> {
    if index <= 0xff {
        w.write_u8(base)?;
        w.write_u8(index as u8)
    } else {
        w.write_u8(base + 1)?;
        w.write_u16::<BigEndian>(index)
    }
}

/// Bind string token `s` to `index`.
pub fn put_define_string<W: Write>(w: &mut W, index: u16, s: &str) -> io::Result<()> {
    put_index(w, DEFINE_STRING, index)?;
    put_string(w, s)
}

/// Reference string token `index`.
pub fn put_interpolate_string<W: Write>(w: &mut W, index: u16) -> io::Result<()> {
    put_index(w, INTERPOLATE_STRING, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_widths() -> io::Result<()> {
        let mut b = Vec::new();
        put_int(&mut b, 5)?;
        assert_eq!(b, [0o200, 5]);

        b.clear();
        put_int(&mut b, -2)?;
        assert_eq!(b, [0o200, 0xfe]);

        b.clear();
        put_int(&mut b, 300)?;
        assert_eq!(b, [0o201, 0x01, 0x2c]);

        b.clear();
        put_int(&mut b, 0x0100_0000)?;
        assert_eq!(b, [0o203, 1, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_float_and_arrays() -> io::Result<()> {
        let mut b = Vec::new();
        put_float(&mut b, 1.0)?;
        assert_eq!(b, [0o244, 0x3f, 0x80, 0, 0]);

        b.clear();
        put_float_array(&mut b, &[1.0, 2.0])?;
        assert_eq!(b[..2], [0o310, 2]);
        assert_eq!(b.len(), 2 + 8);

        b.clear();
        put_int_array(&mut b, &[1, 2])?;
        assert_eq!(b, [b'[', 0o200, 1, 0o200, 2, b']']);
        Ok(())
    }

    #[test]
    fn test_strings() -> io::Result<()> {
        let mut b = Vec::new();
        put_string(&mut b, "P")?;
        assert_eq!(b, [0o221, b'P']);

        b.clear();
        let long = "a".repeat(20);
        put_string(&mut b, &long)?;
        assert_eq!(b[..2], [0o240, 20]);
        assert_eq!(b.len(), 22);

        b.clear();
        put_define_string(&mut b, 3, "Cs")?;
        put_interpolate_string(&mut b, 3)?;
        assert_eq!(b, [0o315, 3, 0o222, b'C', b's', 0o317, 3]);
        Ok(())
    }

    #[test]
    fn test_requests() -> io::Result<()> {
        let mut b = Vec::new();
        put_define_request(&mut b, 0, "Sphere")?;
        put_request(&mut b, 0)?;
        assert_eq!(b[..2], [0o314, 0]);
        assert_eq!(b[b.len() - 2..], [0o246, 0]);
        Ok(())
    }
}
