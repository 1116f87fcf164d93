//! Little-endian arbitrary-width integer arithmetic.
//!
//! `bytes` operands to `add`/`subtract`/`multiply`/`divide`/`mod`/`less` are
//! interpreted as base-256 little-endian unsigned integers, matching the
//! wire layout every fixed-size chain integer already uses (capacity,
//! since, nonce, …). A `uint64` operand is promoted to its 8-byte
//! little-endian form before the same grade-school algorithms run.

use std::cmp::Ordering;

pub fn from_uint64(u: u64) -> Vec<u8> {
    u.to_le_bytes().to_vec()
}

fn trim(mut v: Vec<u8>) -> Vec<u8> {
    while v.len() > 1 && *v.last().unwrap() == 0 {
        v.pop();
    }
    v
}

pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
    let a = trim(a.to_vec());
    let b = trim(b.to_vec());
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }
    for i in (0..a.len()).rev() {
        if a[i] != b[i] {
            return a[i].cmp(&b[i]);
        }
    }
    Ordering::Equal
}

pub fn add(a: &[u8], b: &[u8]) -> Vec<u8> {
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len + 1);
    let mut carry = 0u16;
    for i in 0..len {
        let x = *a.get(i).unwrap_or(&0) as u16;
        let y = *b.get(i).unwrap_or(&0) as u16;
        let sum = x + y + carry;
        out.push((sum & 0xff) as u8);
        carry = sum >> 8;
    }
    if carry > 0 {
        out.push(carry as u8);
    }
    out
}

/// Unsigned subtraction; returns `None` on underflow (`a < b`).
pub fn subtract(a: &[u8], b: &[u8]) -> Option<Vec<u8>> {
    if compare(a, b) == Ordering::Less {
        return None;
    }
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len);
    let mut borrow = 0i32;
    for i in 0..len {
        let x = *a.get(i).unwrap_or(&0) as i32;
        let y = *b.get(i).unwrap_or(&0) as i32;
        let mut diff = x - y - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out.push(diff as u8);
    }
    Some(out)
}

pub fn multiply(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u16; a.len() + b.len()];
    for (i, &x) in a.iter().enumerate() {
        let mut carry = 0u16;
        for (j, &y) in b.iter().enumerate() {
            let product = out[i + j] + (x as u16) * (y as u16) + carry;
            out[i + j] = product & 0xff;
            carry = product >> 8;
        }
        let mut k = i + b.len();
        while carry > 0 {
            let sum = out[k] + carry;
            out[k] = sum & 0xff;
            carry = sum >> 8;
            k += 1;
        }
    }
    trim(out.into_iter().map(|x| x as u8).collect())
}

/// Long division; returns `(quotient, remainder)`. Caller must reject a
/// zero divisor before calling.
pub fn divmod(a: &[u8], b: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let a = trim(a.to_vec());
    let mut remainder: Vec<u8> = vec![0];
    let mut quotient = vec![0u8; a.len()];
    for i in (0..a.len()).rev() {
        // remainder = remainder * 256 + a[i]
        remainder.insert(0, a[i]);
        remainder = trim(remainder);
        let mut count = 0u8;
        while compare(&remainder, b) != Ordering::Less {
            remainder = subtract(&remainder, b).expect("checked not less");
            count += 1;
        }
        quotient[i] = count;
    }
    (trim(quotient), trim(remainder))
}
