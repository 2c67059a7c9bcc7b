// Copyright 2024 FerroStore Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rand::Rng;
use std::io::{Error, Result};

/// Parses a boolean value from a string.
///
/// # Arguments
/// * `str` - A string slice representing the boolean value.
///
/// # Returns
/// A `Result` containing the parsed boolean value or an error if parsing fails.
pub fn parse_bool(str: &str) -> Result<bool> {
    match str {
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "on" | "ON" | "On" | "enabled" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" | "off" | "OFF" | "Off" | "disabled" => Ok(false),
        _ => Err(Error::other(format!("ParseBool: parsing {str}"))),
    }
}

/// Generates a random access key of the specified length.
///
/// The result is drawn from uppercase letters and digits only, so it
/// satisfies the access-key charset requirement.
///
/// # Arguments
/// * `length` - The length of the access key to be generated.
///
/// # Errors
/// * Returns an error if the length is less than 3.
pub fn gen_access_key(length: usize) -> Result<String> {
    const ALPHA_NUMERIC_TABLE: [char; 36] = [
        '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N',
        'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    ];

    if length < 3 {
        return Err(Error::other("access key length is too short"));
    }

    let mut result = String::with_capacity(length);
    let mut rng = rand::rng();

    for _ in 0..length {
        result.push(ALPHA_NUMERIC_TABLE[rng.random_range(0..ALPHA_NUMERIC_TABLE.len())]);
    }

    Ok(result)
}

/// Generates a random secret key of the specified length.
///
/// The result is drawn from the base64 alphabet, so it satisfies the
/// secret-key charset requirement.
///
/// # Arguments
/// * `length` - The length of the secret key to be generated.
///
/// # Errors
/// * Returns an error if the length is less than 8.
pub fn gen_secret_key(length: usize) -> Result<String> {
    const SECRET_KEY_TABLE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    if length < 8 {
        return Err(Error::other("secret key length is too short"));
    }

    let mut result = String::with_capacity(length);
    let mut rng = rand::rng();

    for _ in 0..length {
        result.push(SECRET_KEY_TABLE[rng.random_range(0..SECRET_KEY_TABLE.len())] as char);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        let true_values = ["1", "t", "T", "true", "TRUE", "True", "on", "ON", "On", "enabled"];
        let false_values = ["0", "f", "F", "false", "FALSE", "False", "off", "OFF", "Off", "disabled"];

        for val in true_values {
            assert!(parse_bool(val).unwrap(), "{val} should parse as true");
        }
        for val in false_values {
            assert!(!parse_bool(val).unwrap(), "{val} should parse as false");
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_gen_access_key_charset() {
        let key = gen_access_key(20).unwrap();
        assert_eq!(key.len(), 20);
        for ch in key.chars() {
            assert!(
                ch.is_ascii_uppercase() || ch.is_ascii_digit(),
                "access key should only contain uppercase letters and digits"
            );
        }
    }

    #[test]
    fn test_gen_access_key_invalid_length() {
        assert!(gen_access_key(2).is_err());
        let error = gen_access_key(2).unwrap_err();
        assert_eq!(error.to_string(), "access key length is too short");
    }

    #[test]
    fn test_gen_secret_key_charset() {
        let key = gen_secret_key(40).unwrap();
        assert_eq!(key.len(), 40);
        for ch in key.chars() {
            assert!(
                ch.is_ascii_alphanumeric() || ch == '+' || ch == '/',
                "secret key should stay within the base64 alphabet"
            );
        }
    }

    #[test]
    fn test_gen_secret_key_invalid_length() {
        assert!(gen_secret_key(7).is_err());
        let error = gen_secret_key(5).unwrap_err();
        assert_eq!(error.to_string(), "secret key length is too short");
    }

    #[test]
    fn test_generated_keys_are_unique() {
        assert_ne!(gen_access_key(20).unwrap(), gen_access_key(20).unwrap());
        assert_ne!(gen_secret_key(40).unwrap(), gen_secret_key(40).unwrap());
    }
}
