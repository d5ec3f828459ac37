// ABOUTME: Checksum validator predicates applied to regex matches to cut false positives
// ABOUTME: Implements Luhn, AU TFN/Medicare/ABN, NZ IRD, UK NHS, VIN, IBAN and IPv4 checks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! Checksum validators for the pattern catalogue.
//!
//! Each validator is a pure predicate over the matched substring. A pattern
//! match that fails validation is discarded as if it had never matched.

/// Extract only ASCII digits from a candidate match
fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Luhn checksum over 13-19 digits (payment card numbers)
#[must_use]
pub fn luhn(value: &str) -> bool {
    let digits = digits_of(value);
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// IPv4 octet range check: every dotted group must be 0-255
#[must_use]
pub fn ipv4_octets(value: &str) -> bool {
    let octets: Vec<&str> = value.split('.').collect();
    octets.len() == 4 && octets.iter().all(|o| o.parse::<u16>().is_ok_and(|n| n <= 255))
}

/// IPv6 structural check via the standard library parser
#[must_use]
pub fn ipv6(value: &str) -> bool {
    value.parse::<std::net::Ipv6Addr>().is_ok()
}

/// Australian Tax File Number: modulus-11 with weights [1,2,3,4,5,6,7,8,10]
#[must_use]
pub fn au_tfn(value: &str) -> bool {
    const WEIGHTS: [u32; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 10];
    let digits = digits_of(value);
    if digits.len() != 9 {
        return false;
    }
    let sum: u32 = digits.iter().zip(WEIGHTS).map(|(&d, w)| d * w).sum();
    sum % 11 == 0
}

/// Australian Medicare number: weighted modulus-10 with [1,3,7,9,1,3,7,9,1,3]
///
/// The first eight digits are weighted; the ninth digit is the check digit.
#[must_use]
pub fn au_medicare(value: &str) -> bool {
    const WEIGHTS: [u32; 10] = [1, 3, 7, 9, 1, 3, 7, 9, 1, 3];
    let digits = digits_of(value);
    if digits.len() < 10 || digits.len() > 11 {
        return false;
    }
    if !(2..=6).contains(&digits[0]) {
        return false;
    }
    let sum: u32 = digits[..8].iter().zip(WEIGHTS).map(|(&d, w)| d * w).sum();
    sum % 10 == digits[8]
}

/// Australian Business Number: modulus-89 with first digit decremented
#[must_use]
pub fn au_abn(value: &str) -> bool {
    const WEIGHTS: [u32; 11] = [10, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19];
    let digits = digits_of(value);
    if digits.len() != 11 || digits[0] == 0 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .zip(WEIGHTS)
        .enumerate()
        .map(|(i, (&d, w))| if i == 0 { (d - 1) * w } else { d * w })
        .sum();
    sum % 89 == 0
}

/// New Zealand IRD number: modulus-11 with [3,2,7,6,5,4,3,2] over left-padded 9 digits
#[must_use]
pub fn nz_ird(value: &str) -> bool {
    const WEIGHTS: [u32; 8] = [3, 2, 7, 6, 5, 4, 3, 2];
    let mut digits = digits_of(value);
    if digits.len() < 8 || digits.len() > 9 {
        return false;
    }
    while digits.len() < 9 {
        digits.insert(0, 0);
    }
    let sum: u32 = digits[..8].iter().zip(WEIGHTS).map(|(&d, w)| d * w).sum();
    let remainder = sum % 11;
    let check = if remainder == 0 { 0 } else { 11 - remainder };
    // Check digit 10 requires a secondary calculation in the official scheme;
    // such candidates are rejected outright.
    check != 10 && check == digits[8]
}

/// UK NHS number: modulus-11 with [10,9,8,7,6,5,4,3,2], rejecting check digit 10
#[must_use]
pub fn uk_nhs(value: &str) -> bool {
    const WEIGHTS: [u32; 9] = [10, 9, 8, 7, 6, 5, 4, 3, 2];
    let digits = digits_of(value);
    if digits.len() != 10 {
        return false;
    }
    let sum: u32 = digits[..9].iter().zip(WEIGHTS).map(|(&d, w)| d * w).sum();
    let remainder = sum % 11;
    let check = 11 - remainder;
    match check {
        11 => digits[9] == 0,
        10 => false,
        c => digits[9] == c,
    }
}

/// Vehicle Identification Number check digit at position 9
///
/// Letters transliterate to values (I, O and Q are excluded by the pattern);
/// weighted sum modulo 11 yields the check digit, with 10 written as `X`.
#[must_use]
pub fn vin(value: &str) -> bool {
    const WEIGHTS: [u32; 17] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];
    if value.len() != 17 {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in value.chars().enumerate() {
        let v = match c.to_ascii_uppercase() {
            d @ '0'..='9' => d as u32 - '0' as u32,
            'A' | 'J' => 1,
            'B' | 'K' | 'S' => 2,
            'C' | 'L' | 'T' => 3,
            'D' | 'M' | 'U' => 4,
            'E' | 'N' | 'V' => 5,
            'F' | 'W' => 6,
            'G' | 'P' | 'X' => 7,
            'H' | 'Y' => 8,
            'R' | 'Z' => 9,
            _ => return false,
        };
        sum += v * WEIGHTS[i];
    }
    let check = sum % 11;
    let expected = value.chars().nth(8).map(|c| c.to_ascii_uppercase());
    match check {
        10 => expected == Some('X'),
        c => expected == char::from_digit(c, 10),
    }
}

/// IBAN modulus-97 check (ISO 13616)
#[must_use]
pub fn iban(value: &str) -> bool {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if cleaned.len() < 15 || cleaned.len() > 34 {
        return false;
    }
    // Move the first four characters to the end, then compute mod 97 over
    // the digit expansion (A=10 .. Z=35) without big-integer arithmetic.
    let rearranged = format!("{}{}", &cleaned[4..], &cleaned[..4]);
    let mut remainder: u64 = 0;
    for c in rearranged.chars() {
        let v = match c {
            '0'..='9' => c as u64 - '0' as u64,
            'A'..='Z' => c as u64 - 'A' as u64 + 10,
            'a'..='z' => c as u64 - 'a' as u64 + 10,
            _ => return false,
        };
        remainder = if v < 10 {
            (remainder * 10 + v) % 97
        } else {
            (remainder * 100 + v) % 97
        };
    }
    remainder == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luhn_valid_and_invalid() {
        assert!(luhn("4532 0151 1283 0366"));
        assert!(!luhn("4532 0151 1283 0367"));
        assert!(luhn("4111111111111111"));
        // Too short even if digits check out
        assert!(!luhn("059"));
    }

    #[test]
    fn ipv4_octet_ranges() {
        assert!(ipv4_octets("192.168.1.1"));
        assert!(ipv4_octets("255.255.255.255"));
        assert!(!ipv4_octets("256.1.1.1"));
        assert!(!ipv4_octets("1.2.3"));
    }

    #[test]
    fn ipv6_parses() {
        assert!(ipv6("2001:db8::8a2e:370:7334"));
        assert!(!ipv6("2001:zz8::1"));
    }

    #[test]
    fn au_tfn_mod11() {
        assert!(au_tfn("123 456 786"));
        assert!(!au_tfn("123 456 789"));
        assert!(!au_tfn("12345678"));
    }

    #[test]
    fn au_medicare_weighted_mod10() {
        assert!(au_medicare("2123 45670 1"));
        assert!(!au_medicare("2123 45671 1"));
        // First digit must be 2-6
        assert!(!au_medicare("9123 45670 1"));
    }

    #[test]
    fn au_abn_mod89() {
        assert!(au_abn("51 824 753 556"));
        assert!(!au_abn("51 824 753 557"));
    }

    #[test]
    fn nz_ird_mod11() {
        assert!(nz_ird("49091850"));
        assert!(!nz_ird("49091851"));
    }

    #[test]
    fn uk_nhs_mod11() {
        assert!(uk_nhs("943 476 5919"));
        assert!(!uk_nhs("943 476 5918"));
    }

    #[test]
    fn vin_check_digit() {
        assert!(vin("1HGCM82633A004352"));
        assert!(!vin("1HGCM82634A004352"));
        assert!(!vin("1HGCM8263"));
    }

    #[test]
    fn iban_mod97() {
        assert!(iban("GB82 WEST 1234 5698 7654 32"));
        assert!(!iban("GB82 WEST 1234 5698 7654 33"));
    }
}
