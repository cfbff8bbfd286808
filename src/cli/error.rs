// Argument validation for the command line.
//
// Validators return `String` errors so clap can report them as usage errors;
// failures past argument parsing are raised as `SapError` and mapped to exit
// codes by the binary.

use std::str::FromStr;

/// Validate that an id is a positive integer
pub fn validate_id(id_str: &str) -> Result<i64, String> {
    id_str.trim().parse::<i64>()
        .map_err(|_| format!("Invalid ID: '{}'. ID must be a number.", id_str))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid ID: {}. ID must be positive.", id))
            }
        })
}

/// Parse an id list such as `1,2,5-7`
///
/// Ranges are inclusive. Order is preserved and repeated ids are kept, since
/// the operations compare the number of ids found with the number requested.
pub fn parse_id_list(list: &str) -> Result<Vec<i64>, String> {
    let mut ids = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(format!("Invalid ID list: '{}'. Empty element.", list));
        }
        match part.split_once('-') {
            Some((start, end)) => {
                let start = validate_id(start)?;
                let end = validate_id(end)?;
                if start > end {
                    return Err(format!("Invalid ID range: '{}'. Start must not exceed end.", part));
                }
                ids.extend(start..=end);
            }
            None => ids.push(validate_id(part)?),
        }
    }
    Ok(ids)
}

/// Comma-separated id list argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdList(pub Vec<i64>);

impl FromStr for IdList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_id_list(s).map(IdList)
    }
}

impl IdList {
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}
