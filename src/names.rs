//! Name derivation
//!
//! Entity names are CamelCase; generated files are named by splitting the
//! name into words and joining them lower-cased with underscores:
//!
//! - `PoseReport` -> `pose_report`
//! - `IMUData` -> `imu_data`
//! - `GPSFix2D` -> `gps_fix2d`
//!
//! A word boundary falls before an uppercase letter that follows a lowercase
//! letter, and before an uppercase letter that starts a new capitalised word
//! (an uppercase letter followed by a lowercase one, preceded by another
//! uppercase letter).

/// Split a CamelCase name into its words
pub fn split_camel_case(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && !current.is_empty() {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let lower_to_upper = prev.is_ascii_lowercase() && c.is_ascii_uppercase();
            let acronym_end = prev.is_ascii_uppercase()
                && c.is_ascii_uppercase()
                && next.map(|n| n.is_ascii_lowercase()).unwrap_or(false);
            if lower_to_upper || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Lower-case, underscore-separated file identifier for an entity name
pub fn file_name(name: &str) -> String {
    split_camel_case(name)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Include guard for a generated file path (`common_msg/enums/mode` ->
/// `INCLUDE_COMMON_MSG_ENUMS_MODE_H_`)
pub fn include_guard(path: &str) -> String {
    let mut guard = String::from("INCLUDE");
    for segment in path.split('/') {
        guard.push('_');
        guard.push_str(&segment.to_uppercase());
    }
    guard.push_str("_H_");
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_camel_case() {
        assert_eq!(split_camel_case("SplitCamelCase"), vec!["Split", "Camel", "Case"]);
        assert_eq!(split_camel_case("IMUData"), vec!["IMU", "Data"]);
        assert_eq!(split_camel_case("BusObject"), vec!["Bus", "Object"]);
        assert_eq!(split_camel_case("lowercase"), vec!["lowercase"]);
        assert_eq!(split_camel_case("ABC"), vec!["ABC"]);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("PoseReport"), "pose_report");
        assert_eq!(file_name("IMUData"), "imu_data");
        assert_eq!(file_name("MessageId"), "message_id");
        assert_eq!(file_name("GPSFix2D"), "gps_fix2d");
    }

    #[test]
    fn test_include_guard() {
        assert_eq!(
            include_guard("common_msg/enums/flight_mode"),
            "INCLUDE_COMMON_MSG_ENUMS_FLIGHT_MODE_H_"
        );
    }
}
