use planbot::models::MAX_CONTENT_LENGTH;
use planbot::validators::{parse_hhmm, truncate_text, validate_timezone};

#[test]
fn test_truncate_text_caps_long_content() {
    let long = "任".repeat(MAX_CONTENT_LENGTH + 50);
    let (capped, truncated) = truncate_text(&long, MAX_CONTENT_LENGTH);

    assert!(truncated);
    assert_eq!(capped.chars().count(), MAX_CONTENT_LENGTH);
}

#[test]
fn test_truncate_text_leaves_short_content_alone() {
    let (text, truncated) = truncate_text("备份 NAS 配置", MAX_CONTENT_LENGTH);
    assert!(!truncated);
    assert_eq!(text, "备份 NAS 配置");

    // Exactly at the limit is not a truncation.
    let exact = "长".repeat(MAX_CONTENT_LENGTH);
    let (text, truncated) = truncate_text(&exact, MAX_CONTENT_LENGTH);
    assert!(!truncated);
    assert_eq!(text, exact);
}

#[test]
fn test_parse_hhmm_accepts_valid_times() {
    assert_eq!(parse_hhmm("22:00"), Some((22, 0)));
    assert_eq!(parse_hhmm("8:30"), Some((8, 30)));
    assert_eq!(parse_hhmm("00:00"), Some((0, 0)));
}

#[test]
fn test_parse_hhmm_rejects_out_of_range() {
    assert_eq!(parse_hhmm("24:00"), None);
    assert_eq!(parse_hhmm("12:60"), None);
    assert_eq!(parse_hhmm("12:5"), None);
    assert_eq!(parse_hhmm("midnight"), None);
}

#[test]
fn test_validate_timezone() {
    assert!(validate_timezone("Asia/Shanghai").is_some());
    assert!(validate_timezone("Europe/Berlin").is_some());
    assert!(validate_timezone("Mars/Olympus").is_none());
}
