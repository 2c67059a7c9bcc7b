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

use crate::error::{ApiError, Result};
use std::collections::HashMap;

/// Validates that the list has no empty or duplicate entries.
///
/// Empty lists and empty keys are rejected with `InvalidArgument`; the
/// first duplicate in list order is reported with its total count.
pub fn check_duplicates(list: &[String]) -> Result<()> {
    // Empty lists are not allowed.
    if list.is_empty() {
        return Err(ApiError::InvalidArgument);
    }
    // Empty keys are not allowed.
    if list.iter().any(|key| key.is_empty()) {
        return Err(ApiError::InvalidArgument);
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in list {
        *counts.entry(key.as_str()).or_default() += 1;
    }
    for key in list {
        let count = counts[key.as_str()];
        if count != 1 {
            return Err(ApiError::DuplicateKey {
                key: key.clone(),
                count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_check_duplicates() {
        // '/tmp/1' repeated twice.
        let err = check_duplicates(&list(&["/tmp/1", "/tmp/1", "/tmp/2", "/tmp/3"])).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate key: \"/tmp/1\" found of count: \"2\"");

        // '/tmp/1' repeated thrice.
        let err = check_duplicates(&list(&["/tmp/1", "/tmp/1", "/tmp/1", "/tmp/3"])).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate key: \"/tmp/1\" found of count: \"3\"");

        // Empty entry.
        assert!(matches!(check_duplicates(&list(&[""])), Err(ApiError::InvalidArgument)));

        // Empty list.
        assert!(matches!(check_duplicates(&[]), Err(ApiError::InvalidArgument)));

        // Non-repeated entries pass.
        assert!(check_duplicates(&list(&["/tmp/1", "/tmp/2", "/tmp/3"])).is_ok());
    }
}
